//! xplatter CLI entry point

fn main() {
    xplatter::cli::run();
}
