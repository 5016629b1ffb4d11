mod device_info;
mod netif;
mod stack;

pub mod clusters;
pub mod device_types;
pub mod handler;
pub mod node;
pub mod notifier;

pub use device_info::{basic_info, comm_data};
pub use handler::DevicesHandler;
pub use netif::BridgeNetif;
pub use node::build_node;
pub use stack::run_matter_stack;
