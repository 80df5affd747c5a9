#![warn(clippy::all, rust_2018_idioms)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod layers;
mod map;
mod maps_api;
mod ui;

use layers::menu::{InitialSelection, MenuState};
use layers::spec::{catalog, SECTION_BASE};

fn main() -> eframe::Result<()> {
    env_logger::init();
    dotenv::dotenv().ok();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(egui::vec2(1600.0, 1000.0))
            .with_min_inner_size(egui::vec2(400.0, 300.0))
            .with_title("PeakMap")
            .with_resizable(true)
            .with_decorations(true)
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let token = dotenv::var("MAPBOX_ACCESS_TOKEN").unwrap_or_default();
    if token.is_empty() {
        log::warn!("MAPBOX_ACCESS_TOKEN is not set; mapbox base layers will not load");
    }

    let tree = match catalog(&token) {
        Ok(tree) => tree,
        Err(e) => {
            log::error!("layer catalog failed to load: {}", e);
            return Ok(());
        }
    };

    let mut menu = MenuState::new(tree);
    let mut initial_effects = menu.apply_initial(&InitialSelection::from_env());

    // Fall back to the first base layer when none was requested.
    if menu.active_base().is_none() {
        let mut id = menu.tree().section(SECTION_BASE);
        while let Some(current) = id {
            if menu.tree().node(current).is_leaf() {
                break;
            }
            id = menu.tree().children(current).first().copied();
        }
        if let Some(leaf) = id {
            initial_effects.extend(menu.select_base(leaf));
        }
    }

    eframe::run_native(
        "PeakMap",
        native_options,
        Box::new(move |cc| Ok(Box::new(ui::app::PeakApp::new(cc, menu, initial_effects)))),
    )
}
