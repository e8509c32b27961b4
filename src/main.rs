fn main() {
    if let Err(err) = strava_mcp_setup::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
