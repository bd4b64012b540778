//! Version command

/// Run the version command.
pub fn run() {
    println!("devrig {}", env!("CARGO_PKG_VERSION"));
}
