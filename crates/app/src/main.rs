fn main() {
    if let Err(error) = pixlift_app::run_from_env() {
        tracing::error!("{error:#}");
        std::process::exit(1);
    }
}
