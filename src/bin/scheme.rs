use scheme_eval::cmdline;

fn main() {
    pretty_env_logger::init();
    let args = std::env::args().collect();
    if let Err(e) = cmdline::launch(args) {
        eprintln!("{}", cmdline::render_error(&e));
        std::process::exit(1);
    }
}
