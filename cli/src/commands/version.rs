//! Version command

/// Run the version command.
pub fn run() {
    println!("tplcheck {}", env!("CARGO_PKG_VERSION"));
}
