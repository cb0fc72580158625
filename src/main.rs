fn main() {
    env_logger::init();
    std::process::exit(match cook::run::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("cook: {:#}", err);
            1
        }
    });
}
