//! Accessory simulation for running without hardware.
//!
//! Presses the simulated accessories periodically, the way someone walking
//! past the wall buttons would.

use crate::accessory::{PressType, WindowAccessory};
use crate::device::SimulatedAccessory;
use log::info;
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};

const PRESS_CYCLE: [PressType; 3] = [
    PressType::SinglePress,
    PressType::DoublePress,
    PressType::LongPress,
];

/// Spawn the blind motors and a task that exercises every simulated accessory.
///
/// The first round runs one `period` after start. Abort the returned handles
/// to stop the simulation.
pub fn run_simulation(
    accessories: Vec<SimulatedAccessory>,
    period: Duration,
    blind_tick: Duration,
) -> Vec<JoinHandle<()>> {
    let mut handles: Vec<JoinHandle<()>> = accessories
        .iter()
        .filter_map(|accessory| match accessory {
            SimulatedAccessory::Blind(blind) => Some(blind.clone().run(blind_tick)),
            _ => None,
        })
        .collect();

    info!(
        "[Sim] Simulating {} accessories every {:?}",
        accessories.len(),
        period
    );

    handles.push(tokio::spawn(async move {
        let mut interval = interval(period);
        // The first tick completes immediately
        interval.tick().await;

        let mut round = 0usize;
        loop {
            interval.tick().await;
            simulate_round(&accessories, round);
            round = round.wrapping_add(1);
        }
    }));

    handles
}

/// One round of simulated physical interaction.
pub fn simulate_round(accessories: &[SimulatedAccessory], round: usize) {
    for accessory in accessories {
        match accessory {
            SimulatedAccessory::Relay(relay) => {
                relay.press_button();
            }
            SimulatedAccessory::Blind(blind) => {
                let target = if blind.target_position() < 50 { 100 } else { 0 };
                info!("[Sim] {} sent to {}%", blind.name(), target);
                blind.move_to(target);
            }
            SimulatedAccessory::Button(button) => {
                button.press(PRESS_CYCLE[round % PRESS_CYCLE.len()]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessory::{
        ButtonAccessory, OnOffAccessory, SimulatedBlind, SimulatedButton, SimulatedRelay,
    };
    use std::sync::Arc;

    #[test]
    fn test_round_toggles_relays_and_flips_blinds() {
        let relay = Arc::new(SimulatedRelay::new("Lamp"));
        let blind = Arc::new(SimulatedBlind::new(
            "Blind",
            Duration::from_secs(1),
            Duration::from_secs(1),
        ));
        let accessories = vec![
            SimulatedAccessory::Relay(relay.clone()),
            SimulatedAccessory::Blind(blind.clone()),
        ];

        simulate_round(&accessories, 0);
        assert!(OnOffAccessory::power(relay.as_ref()));
        assert_eq!(blind.target_position(), 100);

        simulate_round(&accessories, 1);
        assert!(!OnOffAccessory::power(relay.as_ref()));
        assert_eq!(blind.target_position(), 0);
    }

    #[test]
    fn test_buttons_cycle_press_types() {
        let button = Arc::new(SimulatedButton::new("Button"));
        let accessories = vec![SimulatedAccessory::Button(button.clone())];

        let seen: Vec<Option<PressType>> = (0..4)
            .map(|round| {
                simulate_round(&accessories, round);
                button.last_press_type()
            })
            .collect();

        assert_eq!(
            seen,
            vec![
                Some(PressType::SinglePress),
                Some(PressType::DoublePress),
                Some(PressType::LongPress),
                Some(PressType::SinglePress),
            ]
        );
    }

    #[test]
    fn test_run_simulation_spawns_blind_motors() {
        tokio_test::block_on(async {
            let blind = Arc::new(SimulatedBlind::new("Blind", Duration::ZERO, Duration::ZERO));
            let accessories = vec![
                SimulatedAccessory::Blind(blind),
                SimulatedAccessory::Relay(Arc::new(SimulatedRelay::new("Lamp"))),
            ];

            let handles = run_simulation(
                accessories,
                Duration::from_secs(60),
                Duration::from_millis(10),
            );
            assert_eq!(handles.len(), 2);
            for handle in handles {
                handle.abort();
            }
        });
    }
}
