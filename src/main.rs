//! App bootstrap.

use bevy::prelude::*;
use bevy::window::WindowPlugin;

fn main() {
    let mut app = App::new();
    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Cellstorm".into(),
            resolution: (1280, 720).into(),
            ..default()
        }),
        ..default()
    }));
    cellstorm::build_app(&mut app);
    app.run();
}
