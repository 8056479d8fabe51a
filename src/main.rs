use std::process::ExitCode;

fn main() -> ExitCode {
    match clinic_agenda::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("clinic-agenda: {error}");
            ExitCode::FAILURE
        }
    }
}
