//! Installs the hook with the built-in sample remaps.

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use keyshift_core::{engine, keyboard_hook, RemapConfig};

    tracing_subscriber::fmt::init();

    println!("Starting hook with the sample remaps (LAlt+D -> LCtrl+V, ...)");
    let tables = RemapConfig::sample().build()?;
    {
        let mut engine = engine::ENGINE.lock();
        engine.load_tables(tables);
        engine.set_enabled(true);
    }

    keyboard_hook::install_hook()?;
    keyboard_hook::run_event_loop();
    keyboard_hook::uninstall_hook();

    Ok(())
}

#[cfg(not(windows))]
fn main() {
    eprintln!("simple_hook needs Windows");
}
