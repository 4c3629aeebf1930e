use clap::Parser;
use client::camera::Camera;
use client::game::{load_tile_table, BlockPalette};
use client::input::InputManager;
use client::network::Client;
use client::rendering::{HudInfo, Renderer};
use log::{error, info};
use macroquad::prelude::*;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Map size used when no server is reachable
    #[arg(short = 'm', long, default_value_t = shared::MAP_SIZE)]
    map_size: usize,

    /// JSON tile classification table, e.g. {"block7": "ramp"}
    #[arg(short = 't', long)]
    tiles: Option<PathBuf>,

    /// Play alone without contacting a server
    #[arg(long)]
    offline: bool,

    /// Window width
    #[arg(short = 'w', long, default_value = "1024")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "768")]
    height: usize,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "IsoCity".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()).await {
        error!("Client error: {}", e);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let tiles = load_tile_table(args.tiles.as_deref())?;

    // Socket tasks live on tokio; the frame loop stays on macroquad's executor
    let runtime = tokio::runtime::Runtime::new()?;

    let mut client = if args.offline {
        Client::offline(args.map_size, tiles)
    } else {
        runtime.block_on(Client::connect_or_offline(
            &args.server,
            args.map_size,
            tiles,
        ))
    };

    info!("Controls: A/D/W/S drive, left click build, right click remove");
    info!("Wheel zoom, middle drag pan, R rotate, V spawn car, F follow, 1-9/Tab block");

    let mut renderer = Renderer::new(args.width, args.height);
    let mut input = InputManager::new();
    let mut palette = BlockPalette::new();
    let mut camera = Camera::new(client.state().world().size(), screen_width());

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        client.pump();
        let map_size = client.state().world().size();
        if camera.map_size() != map_size {
            camera.set_map_size(map_size);
        }

        let frame = input.update();

        if frame.rotate {
            camera.rotate();
        }
        if frame.zoom != 0.0 {
            camera.zoom_at(frame.mouse.0, frame.mouse.1, frame.zoom);
        }
        if let Some((dx, dy)) = frame.pan {
            camera.pan(dx, dy);
        }
        if frame.toggle_follow {
            camera.toggle_follow();
        }
        if let Some(slot) = frame.select {
            palette.select(slot);
        }
        if frame.cycle_block {
            palette.cycle();
        }

        let hovered = camera.projection().pick(frame.mouse.0, frame.mouse.1);
        if let Some((r, c)) = hovered {
            if frame.place {
                client.place_block(r, c, palette.current());
            }
            if frame.remove {
                client.remove_block(r, c);
            }
            if frame.spawn_vehicle {
                client.spawn_vehicle(r, c);
            }
        }

        client.tick(frame.drive);

        if camera.follow {
            if let Some(vehicle) = client.state().vehicle() {
                camera.centre_on(&vehicle.pose, screen_width(), screen_height());
            }
        }

        let state = client.state();
        let local = state.vehicle().map(|v| (v.pose, true));
        let remote = state.remote_players().map(|(_, pose)| (*pose, false));
        renderer.render(
            state.world(),
            state.tiles(),
            &camera,
            local.into_iter().chain(remote),
            hovered,
            HudInfo {
                client_id: state.client_id(),
                online: client.is_online(),
                selected_block: palette.current(),
                remote_players: state.remote_players().count(),
                follow: camera.follow,
            },
        );

        next_frame().await;
    }

    client.shutdown();
    runtime.shutdown_timeout(Duration::from_millis(250));

    Ok(())
}
