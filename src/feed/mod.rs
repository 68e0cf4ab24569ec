// Simulated vitals feed and broadcast hub

mod hub;
mod simulator;

pub use hub::{FeedHub, FeedSubscription};
pub use simulator::{run_simulator, VitalsSimulator};
