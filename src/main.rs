use std::process::ExitCode;

fn main() -> ExitCode {
    match lab::run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:?}");
            ExitCode::from(lab::exit_code(&e))
        }
    }
}
