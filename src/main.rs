fn main() {
    std::process::exit(costume_studio_lib::run())
}
