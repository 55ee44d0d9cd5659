fn main() {
    wdlcheck::cli::run();
}
