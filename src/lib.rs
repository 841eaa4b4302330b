pub mod kernel;

// Re-export the main entry points for convenient access.
pub use kernel::controller::Controller;
pub use kernel::machine::ContactStateMachine;
