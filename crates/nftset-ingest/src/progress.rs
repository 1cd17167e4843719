//! Progress spinners for long table scans

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner with a message; hidden automatically when stderr is not a terminal
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_message() {
        let pb = spinner("Downloading NFT files");
        assert_eq!(pb.message(), "Downloading NFT files");
        pb.finish_and_clear();
    }
}
