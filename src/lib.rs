// Configuration
pub mod config;

// Patient vitals model and validation
pub mod vitals;

// Rolling per-patient history
pub mod history;

// Batch reconciliation
pub mod reconcile;

// Isolated worker tasks
pub mod worker;

// Observer session
pub mod session;

// Simulated feed and broadcast hub
pub mod feed;

// HTTP and WebSocket APIs
pub mod api;

// WebSocket client for remote observers
pub mod transport;
