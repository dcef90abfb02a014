/// Display version information
pub fn execute() {
    println!("timegate {}", env!("CARGO_PKG_VERSION"));
    println!("Time-limited channel access bot for Telegram");
}
