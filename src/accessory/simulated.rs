//! Simulated accessories for running the bridge without hardware.
//!
//! These behave like the drivers they stand in for: local "button presses"
//! change state and fire the report callback, the blind travels toward its
//! target over the configured open/close time.

use super::{
    ButtonAccessory, FanAccessory, OnOffAccessory, PressType, ReportCallback, WindowAccessory,
};
use crate::callback::CallbackSlot;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Simulated relay, used for lights, plug-in units and fans.
pub struct SimulatedRelay {
    name: String,
    power: AtomicBool,
    identify_count: AtomicU32,
    report: CallbackSlot,
}

impl SimulatedRelay {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            power: AtomicBool::new(false),
            identify_count: AtomicU32::new(0),
            report: CallbackSlot::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Toggle the relay as a physical wall button would, then report.
    pub fn press_button(&self) -> bool {
        let on = !self.power.fetch_xor(true, Ordering::SeqCst);
        info!("[Sim] {} button pressed, relay {}", self.name, on_off(on));
        self.report.fire();
        on
    }

    /// Number of identify requests received so far.
    pub fn identify_count(&self) -> u32 {
        self.identify_count.load(Ordering::SeqCst)
    }

    fn identify_relay(&self) {
        self.identify_count.fetch_add(1, Ordering::SeqCst);
        info!("[Sim] {} identifying", self.name);
    }
}

impl OnOffAccessory for SimulatedRelay {
    fn power(&self) -> bool {
        self.power.load(Ordering::SeqCst)
    }

    fn set_power(&self, on: bool) {
        let old = self.power.swap(on, Ordering::SeqCst);
        if old != on {
            info!("[Sim] {} relay {}", self.name, on_off(on));
        }
    }

    fn identify(&self) {
        self.identify_relay();
    }

    fn set_report_callback(&self, callback: ReportCallback) {
        self.report.set(callback);
    }
}

impl FanAccessory for SimulatedRelay {
    fn power(&self) -> bool {
        OnOffAccessory::power(self)
    }

    fn set_power(&self, on: bool) {
        OnOffAccessory::set_power(self, on)
    }

    fn identify(&self) {
        self.identify_relay();
    }

    fn set_report_callback(&self, callback: ReportCallback) {
        self.report.set(callback);
    }
}

/// Position of a blind in hundredths of a percent (0 = open, 10000 = closed).
#[derive(Debug, Clone, Copy)]
struct BlindMotion {
    position: u32,
    target: u32,
    /// Travel time not yet turned into a whole step, scaled by 10000.
    carry: u128,
}

impl BlindMotion {
    fn head_for(&mut self, target: u32) {
        self.target = target;
        self.carry = 0;
    }
}

/// Simulated motorized blind with separate open and close travel times.
pub struct SimulatedBlind {
    name: String,
    time_to_open: Duration,
    time_to_close: Duration,
    motion: Mutex<BlindMotion>,
    identify_count: AtomicU32,
    report: CallbackSlot,
}

impl SimulatedBlind {
    /// Full travel is 100 percent; a zero travel time moves instantly.
    pub fn new(name: impl Into<String>, time_to_open: Duration, time_to_close: Duration) -> Self {
        Self {
            name: name.into(),
            time_to_open,
            time_to_close,
            motion: Mutex::new(BlindMotion {
                position: 0,
                target: 0,
                carry: 0,
            }),
            identify_count: AtomicU32::new(0),
            report: CallbackSlot::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_moving(&self) -> bool {
        let motion = self.motion.lock();
        motion.position != motion.target
    }

    pub fn identify_count(&self) -> u32 {
        self.identify_count.load(Ordering::SeqCst)
    }

    /// Halt the motor where it is.
    pub fn stop(&self) {
        {
            let mut motion = self.motion.lock();
            let position = motion.position;
            motion.head_for(position);
        }
        info!("[Sim] {} stopped", self.name);
        self.report.fire();
    }

    /// Advance the motor by `elapsed` of travel time.
    ///
    /// Reports whenever the whole-percent position changes and when the
    /// target is reached.
    pub fn advance(&self, elapsed: Duration) {
        let (changed, arrived) = {
            let mut motion = self.motion.lock();
            if motion.position == motion.target {
                return;
            }

            let closing = motion.target > motion.position;
            let travel = if closing {
                self.time_to_close
            } else {
                self.time_to_open
            };
            let remaining = motion.position.abs_diff(motion.target);
            let step = if travel.is_zero() {
                remaining
            } else {
                let travel = travel.as_micros();
                let progress = motion.carry + elapsed.as_micros() * 10_000;
                motion.carry = progress % travel;
                (progress / travel).min(remaining as u128) as u32
            };

            let before = motion.position / 100;
            if closing {
                motion.position += step;
            } else {
                motion.position -= step;
            }
            let arrived = motion.position == motion.target;
            if arrived {
                motion.carry = 0;
            }
            (motion.position / 100 != before, arrived)
        };

        if arrived {
            info!(
                "[Sim] {} reached {}%",
                self.name,
                self.current_position()
            );
        }
        if changed || arrived {
            self.report.fire();
        }
    }

    /// Spawn a task that drives the motor every `tick`.
    pub fn run(self: Arc<Self>, tick: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = interval(tick);
            loop {
                interval.tick().await;
                self.advance(tick);
            }
        })
    }
}

impl WindowAccessory for SimulatedBlind {
    fn current_position(&self) -> u16 {
        (self.motion.lock().position / 100) as u16
    }

    fn target_position(&self) -> u16 {
        (self.motion.lock().target / 100) as u16
    }

    fn move_to(&self, position: u16) {
        let position = if position > 100 {
            warn!(
                "[Sim] {} asked to move to {}%, clamping to 100%",
                self.name, position
            );
            100
        } else {
            position
        };

        self.motion.lock().head_for(position as u32 * 100);
        info!("[Sim] {} moving to {}%", self.name, position);
        self.report.fire();
    }

    fn identify(&self) {
        self.identify_count.fetch_add(1, Ordering::SeqCst);
        info!("[Sim] {} identifying", self.name);
    }

    fn set_report_callback(&self, callback: ReportCallback) {
        self.report.set(callback);
    }
}

/// Simulated momentary button.
pub struct SimulatedButton {
    name: String,
    last_press: Mutex<Option<PressType>>,
    report: CallbackSlot,
}

impl SimulatedButton {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_press: Mutex::new(None),
            report: CallbackSlot::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a detected press and report it.
    pub fn press(&self, press: PressType) {
        *self.last_press.lock() = Some(press);
        info!("[Sim] {} {:?}", self.name, press);
        self.report.fire();
    }
}

impl ButtonAccessory for SimulatedButton {
    fn last_press_type(&self) -> Option<PressType> {
        *self.last_press.lock()
    }

    fn set_report_callback(&self, callback: ReportCallback) {
        self.report.set(callback);
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_callback() -> (ReportCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        (
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            count,
        )
    }

    #[test]
    fn test_relay_button_toggles_and_reports() {
        let relay = SimulatedRelay::new("Desk Lamp");
        let (callback, reports) = counting_callback();
        OnOffAccessory::set_report_callback(&relay, callback);

        assert!(relay.press_button());
        assert!(OnOffAccessory::power(&relay));
        assert!(!relay.press_button());
        assert_eq!(reports.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_relay_set_power_does_not_report() {
        let relay = SimulatedRelay::new("Outlet");
        let (callback, reports) = counting_callback();
        OnOffAccessory::set_report_callback(&relay, callback);

        OnOffAccessory::set_power(&relay, true);
        assert!(OnOffAccessory::power(&relay));
        assert_eq!(reports.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_blind_closes_over_close_time() {
        let blind = SimulatedBlind::new(
            "Blind",
            Duration::from_secs(10),
            Duration::from_secs(20),
        );
        blind.move_to(50);
        assert_eq!(blind.target_position(), 50);
        assert!(blind.is_moving());

        // 20s for full travel, so 2s moves 10%
        blind.advance(Duration::from_secs(2));
        assert_eq!(blind.current_position(), 10);

        blind.advance(Duration::from_secs(60));
        assert_eq!(blind.current_position(), 50);
        assert!(!blind.is_moving());
    }

    #[test]
    fn test_blind_opens_over_open_time() {
        let blind = SimulatedBlind::new("Blind", Duration::from_secs(10), Duration::ZERO);
        blind.move_to(100);
        blind.advance(Duration::from_millis(1));
        assert_eq!(blind.current_position(), 100);

        blind.move_to(0);
        blind.advance(Duration::from_secs(5));
        assert_eq!(blind.current_position(), 50);
        blind.advance(Duration::from_secs(5));
        assert_eq!(blind.current_position(), 0);
    }

    #[test]
    fn test_blind_reports_progress_and_arrival() {
        let blind = SimulatedBlind::new("Blind", Duration::from_secs(1), Duration::from_secs(1));
        let (callback, reports) = counting_callback();
        blind.set_report_callback(callback);

        blind.move_to(2);
        assert_eq!(reports.load(Ordering::SeqCst), 1);

        // 5ms is half a percent: no whole-percent change yet
        blind.advance(Duration::from_millis(5));
        assert_eq!(reports.load(Ordering::SeqCst), 1);

        blind.advance(Duration::from_millis(5));
        assert_eq!(reports.load(Ordering::SeqCst), 2);

        blind.advance(Duration::from_secs(1));
        assert_eq!(reports.load(Ordering::SeqCst), 3);

        // Idle motor never reports
        blind.advance(Duration::from_secs(1));
        assert_eq!(reports.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_blind_long_travel_moves_on_short_ticks() {
        let travel = Duration::from_secs(1500);
        let blind = SimulatedBlind::new("Blind", travel, travel);
        blind.move_to(100);

        // Each 100ms tick is less than one hundredth of a percent
        let tick = Duration::from_millis(100);
        for _ in 0..7_500 {
            blind.advance(tick);
        }
        assert_eq!(blind.current_position(), 50);
        assert!(blind.is_moving());

        for _ in 0..7_500 {
            blind.advance(tick);
        }
        assert_eq!(blind.current_position(), 100);
        assert!(!blind.is_moving());
    }

    #[test]
    fn test_blind_arrives_on_travel_time() {
        let travel = Duration::from_secs(30);
        let blind = SimulatedBlind::new("Blind", travel, travel);
        blind.move_to(100);

        // 30s of 100ms ticks arrives exactly on time
        let tick = Duration::from_millis(100);
        for _ in 0..299 {
            blind.advance(tick);
        }
        assert!(blind.is_moving());
        blind.advance(tick);
        assert_eq!(blind.current_position(), 100);
        assert!(!blind.is_moving());
    }

    #[test]
    fn test_blind_new_target_drops_partial_step() {
        let travel = Duration::from_secs(1000);
        let blind = SimulatedBlind::new("Blind", travel, travel);
        blind.move_to(100);
        // Half a step of travel
        blind.advance(Duration::from_millis(50));
        blind.move_to(100);
        blind.advance(Duration::from_millis(50));
        assert_eq!(blind.motion.lock().position, 0);

        blind.advance(Duration::from_millis(50));
        assert_eq!(blind.motion.lock().position, 1);
    }

    #[test]
    fn test_blind_stop_holds_position() {
        let blind = SimulatedBlind::new("Blind", Duration::from_secs(10), Duration::from_secs(10));
        blind.move_to(100);
        blind.advance(Duration::from_secs(3));
        blind.stop();
        assert_eq!(blind.current_position(), 30);
        assert_eq!(blind.target_position(), 30);
        assert!(!blind.is_moving());
    }

    #[test]
    fn test_blind_clamps_target() {
        let blind = SimulatedBlind::new("Blind", Duration::ZERO, Duration::ZERO);
        blind.move_to(250);
        assert_eq!(blind.target_position(), 100);
    }

    #[test]
    fn test_blind_run_task_drives_motor() {
        let blind = Arc::new(SimulatedBlind::new(
            "Blind",
            Duration::from_millis(50),
            Duration::from_millis(50),
        ));
        blind.move_to(100);

        tokio_test::block_on(async {
            let handle = blind.clone().run(Duration::from_millis(5));
            tokio::time::sleep(Duration::from_millis(300)).await;
            handle.abort();
        });

        assert_eq!(blind.current_position(), 100);
    }

    #[test]
    fn test_button_records_last_press() {
        let button = SimulatedButton::new("Wall Button");
        let (callback, reports) = counting_callback();
        button.set_report_callback(callback);

        assert_eq!(button.last_press_type(), None);
        button.press(PressType::DoublePress);
        assert_eq!(button.last_press_type(), Some(PressType::DoublePress));
        assert_eq!(reports.load(Ordering::SeqCst), 1);
    }
}
