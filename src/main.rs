fn main() {
    if let Err(err) = vocabloop_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
