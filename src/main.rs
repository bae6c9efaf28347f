//! Pocket Eight entry point
//!
//! Handles platform-specific initialization and runs the game loop. All rule
//! logic lives in the library; this file only captures input, positions DOM
//! elements and forwards events.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlElement, HtmlSelectElement, MouseEvent, TouchEvent};

    use pocket_eight::Settings;
    use pocket_eight::audio::{AudioManager, SoundEffect};
    use pocket_eight::consts::*;
    use pocket_eight::physics::{BallId, PoolWorld};
    use pocket_eight::sim::{GameEvent, GameState, InputEvent, TurnPhase, tick};

    /// Game instance holding all state
    struct Game {
        state: GameState,
        world: PoolWorld,
        inputs: VecDeque<InputEvent>,
        audio: AudioManager,
        settings: Settings,
        accumulator: f32,
        last_time: f64,
        // UI-side aim/power state; becomes a ShotCommitted event on release
        aim_angle: f32,
        power: f32,
        charging: bool,
        // Foul banner countdown, seconds
        foul_banner: f32,
    }

    impl Game {
        fn new(seed: u64, settings: Settings, width: f32, height: f32) -> Self {
            let mut state = GameState::new(seed, settings.difficulty);
            let world = PoolWorld::new(width, height, &mut state.rng)
                .expect("pool table container is unmeasurable");
            let mut audio = AudioManager::new();
            audio.set_master_volume(settings.master_volume);
            audio.set_sfx_volume(settings.sfx_volume);
            Self {
                state,
                world,
                inputs: VecDeque::new(),
                audio,
                settings,
                accumulator: 0.0,
                last_time: 0.0,
                aim_angle: 0.0,
                power: 0.0,
                charging: false,
                foul_banner: 0.0,
            }
        }

        /// Run simulation ticks
        fn update(&mut self, dt: f32) {
            let dt = dt.min(0.1);
            self.accumulator += dt;

            // Power charges while the button is held, like drawing the cue back
            if self.charging {
                self.power = (self.power + 120.0 * dt).min(100.0);
            }
            if self.foul_banner > 0.0 {
                self.foul_banner -= dt;
                if self.foul_banner <= 0.0 {
                    hide("foul-message");
                }
            }

            let mut substeps = 0;
            while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
                let events = tick(&mut self.state, &mut self.world, &mut self.inputs, SIM_DT);
                self.accumulator -= SIM_DT;
                substeps += 1;
                for event in events {
                    self.handle_event(event);
                }
            }
        }

        fn handle_event(&mut self, event: GameEvent) {
            match event {
                GameEvent::BallHit => self.audio.play(SoundEffect::BallHit),
                GameEvent::BallsPocketed(_) => self.audio.play(SoundEffect::Pocket),
                GameEvent::Foul(foul) => {
                    self.audio.play(SoundEffect::Foul);
                    self.foul_banner = FOUL_BANNER_SECONDS;
                    set_text("foul-message", &format!("Foul: {}", foul));
                    show("foul-message");
                }
                GameEvent::TurnStarted { player_turn } => {
                    log::info!(
                        "turn started: {}",
                        if player_turn { "player" } else { "ai" }
                    );
                    self.power = 0.0;
                    self.charging = false;
                }
                GameEvent::GameEnded(message) => {
                    self.audio.play(SoundEffect::GameOver);
                    set_text("game-status", &message);
                    show("game-status");
                }
            }
        }

        /// Position the DOM ball elements from the physics state
        fn render(&self) {
            let radius = self.world.ball_radius();
            for id in all_ball_ids() {
                let Some(el) = ball_element(id) else { continue };
                match self.world.position_of(id) {
                    Some(pos) => {
                        let style = el.style();
                        let _ = style.set_property("display", "block");
                        let _ = style.set_property("left", &format!("{}px", pos.x - radius));
                        let _ = style.set_property("top", &format!("{}px", pos.y - radius));
                    }
                    None => {
                        let _ = el.style().set_property("display", "none");
                    }
                }
            }

            self.render_cue_stick();
        }

        /// The cue stick and power meter only show while the human aims
        fn render_cue_stick(&self) {
            let aiming = self.state.phase == TurnPhase::Aiming && self.state.player_turn;
            let cue_pos = self.world.cue_position();
            match (aiming, cue_pos) {
                (true, Some(pos)) => {
                    if let Some(el) = element("cue") {
                        let style = el.style();
                        let _ = style.set_property("display", "block");
                        let _ = style.set_property("left", &format!("{}px", pos.x));
                        let _ = style.set_property("top", &format!("{}px", pos.y));
                        let _ =
                            style.set_property("transform", &format!("rotate({}rad)", self.aim_angle));
                    }
                    show("power-meter");
                    if let Some(el) = element("power-level") {
                        let _ = el.style().set_property("width", &format!("{}%", self.power));
                    }
                }
                _ => {
                    hide("cue");
                    hide("power-meter");
                }
            }
        }

        /// Update HUD elements in DOM
        fn update_hud(&self) {
            set_text("timer", &self.state.timer_seconds().to_string());
            let turn = if self.state.game_over() {
                "Game over"
            } else if !self.state.started() {
                "Place the cue ball"
            } else if self.state.player_turn {
                "Your turn"
            } else {
                "AI's turn"
            };
            set_text("player-turn", turn);
        }

        /// Reset for a fresh match with a new seed
        fn restart(&mut self, seed: u64) {
            let (width, height) = (self.world.width(), self.world.height());
            self.state = GameState::new(seed, self.settings.difficulty);
            self.world = PoolWorld::new(width, height, &mut self.state.rng)
                .expect("pool table container is unmeasurable");
            self.inputs.clear();
            self.accumulator = 0.0;
            self.power = 0.0;
            self.charging = false;
            self.foul_banner = 0.0;
            hide("foul-message");
            hide("game-status");
            log::info!("match restarted with seed {}", seed);
        }
    }

    // === Small DOM helpers ===

    fn document() -> web_sys::Document {
        web_sys::window().expect("no window").document().expect("no document")
    }

    fn element(id: &str) -> Option<HtmlElement> {
        document().get_element_by_id(id)?.dyn_into::<HtmlElement>().ok()
    }

    fn set_text(id: &str, text: &str) {
        if let Some(el) = document().get_element_by_id(id) {
            el.set_text_content(Some(text));
        }
    }

    fn show(id: &str) {
        if let Some(el) = element(id) {
            let _ = el.style().set_property("display", "block");
        }
    }

    fn hide(id: &str) {
        if let Some(el) = element(id) {
            let _ = el.style().set_property("display", "none");
        }
    }

    fn all_ball_ids() -> impl Iterator<Item = BallId> {
        std::iter::once(BallId::Cue).chain((1..=15).map(BallId::Ball))
    }

    fn ball_element(id: BallId) -> Option<HtmlElement> {
        element(&ball_element_id(id))
    }

    fn ball_element_id(id: BallId) -> String {
        match id {
            BallId::Cue => "ball-cue".to_string(),
            BallId::Ball(n) => format!("ball-{}", n),
        }
    }

    /// Create one absolutely-positioned div per ball inside the table
    fn create_ball_elements(table: &HtmlElement, radius: f32) {
        let doc = document();
        for id in all_ball_ids() {
            let Ok(el) = doc.create_element("div") else { continue };
            el.set_id(&ball_element_id(id));
            let class = match id {
                BallId::Cue => "ball cue",
                BallId::Ball(8) => "ball eight",
                BallId::Ball(n) if n > 8 => "ball stripe",
                BallId::Ball(_) => "ball solid",
            };
            let _ = el.set_attribute("class", class);
            if let Ok(el) = el.dyn_into::<HtmlElement>() {
                let style = el.style();
                let _ = style.set_property("width", &format!("{}px", radius * 2.0));
                let _ = style.set_property("height", &format!("{}px", radius * 2.0));
                let _ = table.append_child(&el);
            }
        }
    }

    fn table_relative_pos(table: &HtmlElement, client_x: f32, client_y: f32) -> Vec2 {
        let rect = table.get_bounding_client_rect();
        Vec2::new(client_x - rect.left() as f32, client_y - rect.top() as f32)
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Pocket Eight starting...");

        let table = element("pool-table").expect("no pool-table element");

        // Hide loading indicator
        hide("loading");

        // Measure the table; a zero-sized container is fatal, not a silent
        // zero-dimension table
        let width = table.client_width() as f32;
        let height = table.client_height() as f32;

        let settings = Settings::load();
        let seed = js_sys::Date::now() as u64;
        let game = Rc::new(RefCell::new(Game::new(seed, settings, width, height)));
        log::info!("Game initialized with seed: {}", seed);

        create_ball_elements(&table, game.borrow().world.ball_radius());

        setup_input_handlers(&table, game.clone());
        setup_difficulty_select(game.clone());
        setup_restart_button(game.clone());
        setup_blur_mute(game.clone());

        request_animation_frame(game);

        log::info!("Pocket Eight running!");
    }

    fn setup_input_handlers(table: &HtmlElement, game: Rc<RefCell<Game>>) {
        // Mouse move - aim from the cue ball toward the pointer
        {
            let game = game.clone();
            let table_clone = table.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let pos = table_relative_pos(
                    &table_clone,
                    event.client_x() as f32,
                    event.client_y() as f32,
                );
                let mut g = game.borrow_mut();
                if let Some(cue) = g.world.cue_position() {
                    g.aim_angle = (pos.y - cue.y).atan2(pos.x - cue.x);
                }
            });
            let _ = table
                .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Mouse down - place the cue ball, or start charging a shot
        {
            let game = game.clone();
            let table_clone = table.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let pos = table_relative_pos(
                    &table_clone,
                    event.client_x() as f32,
                    event.client_y() as f32,
                );
                let mut g = game.borrow_mut();
                g.audio.resume();
                match g.state.phase {
                    TurnPhase::AwaitingBreakPlacement => {
                        g.inputs.push_back(InputEvent::CueBallPlaced(pos));
                    }
                    TurnPhase::Aiming if g.state.player_turn => {
                        g.charging = true;
                        g.power = 0.0;
                    }
                    _ => {}
                }
            });
            let _ = table
                .add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Mouse up - commit the charged shot
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                let mut g = game.borrow_mut();
                if g.charging {
                    g.charging = false;
                    let angle = g.aim_angle;
                    let power = g.power;
                    g.inputs.push_back(InputEvent::ShotCommitted { angle, power });
                }
            });
            let _ =
                table.add_event_listener_with_callback("mouseup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Touch - same three interactions
        {
            let game = game.clone();
            let table_clone = table.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                let Some(touch) = event.touches().get(0) else { return };
                let pos = table_relative_pos(
                    &table_clone,
                    touch.client_x() as f32,
                    touch.client_y() as f32,
                );
                let mut g = game.borrow_mut();
                g.audio.resume();
                match g.state.phase {
                    TurnPhase::AwaitingBreakPlacement => {
                        g.inputs.push_back(InputEvent::CueBallPlaced(pos));
                    }
                    TurnPhase::Aiming if g.state.player_turn => {
                        if let Some(cue) = g.world.cue_position() {
                            g.aim_angle = (pos.y - cue.y).atan2(pos.x - cue.x);
                        }
                        g.charging = true;
                        g.power = 0.0;
                    }
                    _ => {}
                }
            });
            let _ = table
                .add_event_listener_with_callback("touchstart", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let game = game.clone();
            let table_clone = table.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                let Some(touch) = event.touches().get(0) else { return };
                let pos = table_relative_pos(
                    &table_clone,
                    touch.client_x() as f32,
                    touch.client_y() as f32,
                );
                let mut g = game.borrow_mut();
                if let Some(cue) = g.world.cue_position() {
                    g.aim_angle = (pos.y - cue.y).atan2(pos.x - cue.x);
                }
            });
            let _ = table
                .add_event_listener_with_callback("touchmove", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                let mut g = game.borrow_mut();
                if g.charging {
                    g.charging = false;
                    let angle = g.aim_angle;
                    let power = g.power;
                    g.inputs.push_back(InputEvent::ShotCommitted { angle, power });
                }
            });
            let _ = table
                .add_event_listener_with_callback("touchend", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_difficulty_select(game: Rc<RefCell<Game>>) {
        let Some(select) = document().get_element_by_id("ai-difficulty") else {
            return;
        };
        let Ok(select) = select.dyn_into::<HtmlSelectElement>() else {
            return;
        };
        let select_clone = select.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            if let Some(level) = pocket_eight::Difficulty::from_str(&select_clone.value()) {
                let mut g = game.borrow_mut();
                g.inputs.push_back(InputEvent::DifficultyChanged(level));
                g.settings.difficulty = level;
                g.settings.save();
            }
        });
        let _ = select.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_restart_button(game: Rc<RefCell<Game>>) {
        if let Some(btn) = document().get_element_by_id("restart-button") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                let seed = js_sys::Date::now() as u64;
                game.borrow_mut().restart(seed);
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_blur_mute(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().expect("no window");
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::FocusEvent| {
                let mut g = game.borrow_mut();
                if g.settings.mute_on_blur {
                    g.audio.set_muted(true);
                }
            });
            let _ = window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::FocusEvent| {
                game.borrow_mut().audio.set_muted(false);
            });
            let _ =
                window.add_event_listener_with_callback("focus", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().expect("no window");
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        {
            let mut g = game.borrow_mut();

            let dt = if g.last_time > 0.0 {
                ((time - g.last_time) / 1000.0) as f32
            } else {
                SIM_DT
            };
            g.last_time = time;

            g.update(dt);
            g.render();
            g.update_hud();
        }

        request_animation_frame(game);
    }

}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Pocket Eight (native) starting...");
    log::info!("Native mode has no table UI - run with `trunk serve` for the web version");

    // Smoke-run a scripted break so the sim is exercised natively
    println!("\nRunning break smoke test...");
    smoke_break();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn smoke_break() {
    use pocket_eight::consts::SIM_DT;
    use pocket_eight::physics::PoolWorld;
    use pocket_eight::sim::{Difficulty, GameState, InputEvent, TurnPhase, tick};
    use std::collections::VecDeque;

    let mut state = GameState::new(0xC0FFEE, Difficulty::Medium);
    let mut world = PoolWorld::new(800.0, 400.0, &mut state.rng).expect("table");
    let mut inputs = VecDeque::new();

    inputs.push_back(InputEvent::CueBallPlaced(glam::Vec2::new(150.0, 200.0)));
    inputs.push_back(InputEvent::ShotCommitted {
        angle: std::f32::consts::PI,
        power: 90.0,
    });

    let mut ticks = 0u32;
    loop {
        tick(&mut state, &mut world, &mut inputs, SIM_DT);
        ticks += 1;
        if ticks > 2 && matches!(state.phase, TurnPhase::Aiming | TurnPhase::GameOver) {
            break;
        }
        assert!(ticks < 60_000, "break never settled");
    }

    println!(
        "✓ Break settled after {} ticks, {} balls left on the table",
        ticks,
        world.ball_positions().len()
    );
}
