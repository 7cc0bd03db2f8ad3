//! Binary entry point. Parses argv, dispatches to compress or decompress,
//! and reports a one-line diagnostic on failure (§7).

fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    if let Err(e) = pcompress::cli::run(&argv) {
        eprintln!("pcompress: {e}");
        std::process::exit(1);
    }

    std::process::exit(0);
}
