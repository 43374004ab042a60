fn main() -> std::process::ExitCode {
    rxguard::run()
}
