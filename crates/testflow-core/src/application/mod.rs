/// Flow editor service
pub mod editor;

/// Step and script previews
pub mod preview;

/// Live execution monitor channels
pub mod monitor;
