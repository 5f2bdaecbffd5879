fn main() -> std::process::ExitCode {
    sheet_sync_lib::run()
}
