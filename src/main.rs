fn main() {
    if let Err(err) = attrcat::run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
