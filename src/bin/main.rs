//! Demo binary: opens the panel (and any input devices configured via
//! `FBCON_INPUT_DEVICES`), draws a moving test pattern, and presents it
//! at roughly 60 Hz until a key is pressed.
//!
//! Logging is routed through `env_logger`, reading `RUST_LOG` as usual;
//! the backend itself never installs a logger.

use fbcon_backend::{Backend, Event};

fn main() {
    env_logger::init();

    let mut backend = match Backend::init() {
        Ok(b) => b,
        Err(e) => {
            eprintln!("failed to start backend: {e}");
            std::process::exit(1);
        }
    };

    let width = fbcon_backend::Surface::WIDTH;
    let height = fbcon_backend::Surface::HEIGHT;

    let mut frame: u32 = 0;
    'running: loop {
        {
            let surface = backend.surface_mut();
            let buf = surface.as_mut_slice();
            for y in 0..height {
                for x in 0..width {
                    let r = ((x + frame as usize) & 0x1f) as u16;
                    let g = ((y + frame as usize) & 0x3f) as u16;
                    buf[y * width + x] = (r << 11) | (g << 5);
                }
            }
        }

        backend.present();

        for event in backend.poll_input() {
            match event {
                Event::KeyDown(code) => {
                    log::info!("key down: {code:?}");
                    break 'running;
                }
                Event::KeyUp(code) => log::info!("key up: {code:?}"),
                Event::TouchDown { slot, x, y } => log::info!("touch down slot {slot}: ({x},{y})"),
                Event::TouchMove { slot, x, y } => log::info!("touch move slot {slot}: ({x},{y})"),
                Event::TouchUp { slot } => log::info!("touch up slot {slot}"),
            }
        }

        frame = frame.wrapping_add(1);
    }
}
