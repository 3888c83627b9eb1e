//! Fullscreen overlay window: blurred backdrop plus drifting image cards.

use anyhow::Result;
use eframe::egui;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::Config;
use crate::gallery::{self, DecodedImage, GalleryClient, GalleryEvent};
use crate::idle::{ActivityProbe, Debounce, IdleScheduler, OverlayState, SystemActivity};
use crate::layout::{self, CardSpec};
use crate::logging::SessionLog;

/// Showing the window can synthesize a pointer-move; ignore pointer motion
/// this soon after appearing so the overlay cannot dismiss itself.
const SHOW_GRACE: Duration = Duration::from_millis(300);

/// Gallery-driven collage state: the image list, the chosen backdrop URL
/// and the generated card layout. Kept apart from the texture cache so the
/// load and failure transitions stay plain data.
#[derive(Default)]
struct CollageState {
    images: Vec<String>,
    backdrop_url: Option<String>,
    cards: Vec<CardSpec>,
}

impl CollageState {
    /// Adopt a freshly loaded image list and pick a backdrop from it.
    fn load(&mut self, images: Vec<String>, rng: &mut impl rand::Rng) {
        self.images = images;
        self.backdrop_url = self.images.choose(rng).cloned();
    }

    /// Fetch failure degrades to an empty overlay: no images, no cards,
    /// no backdrop.
    fn clear(&mut self) {
        self.images.clear();
        self.cards.clear();
        self.backdrop_url = None;
    }

    /// Regenerate the card layout for the given screen size.
    fn rebuild(&mut self, size: egui::Vec2, rng: &mut impl rand::Rng) {
        self.cards = layout::build_layout(size.x, size.y, self.images.len(), rng);
    }
}

pub struct OverlayApp {
    config: Config,
    scheduler: Arc<IdleScheduler>,
    session_log: SessionLog,
    events: mpsc::Receiver<GalleryEvent>,
    collage: CollageState,
    textures: HashMap<String, egui::TextureHandle>,
    backdrop: Option<egui::TextureHandle>,
    last_size: egui::Vec2,
    resize_debounce: Debounce,
    rng: StdRng,
    was_shown: bool,
    shown_at: Option<Instant>,
    times_shown: u64,
}

impl OverlayApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: Config,
        scheduler: Arc<IdleScheduler>,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self> {
        let mut session_log = SessionLog::new(config.logging.logs_dir())?;
        session_log.log_session_start(env!("CARGO_PKG_VERSION"))?;

        // Fetch the image list once at startup.
        let (tx, rx) = mpsc::channel();
        let client = GalleryClient::new(&config.gallery)?;
        client.spawn_load(&runtime, tx, cc.egui_ctx.clone());

        // System-wide activity keeps the countdown honest while the window
        // is invisible. Without a probe, only window input resets it.
        let probe: Option<Box<dyn ActivityProbe>> = match SystemActivity::new() {
            Ok(probe) => Some(Box::new(probe)),
            Err(e) => {
                warn!("System activity probe unavailable: {}", e);
                None
            }
        };
        scheduler.start(&runtime, probe);
        spawn_visibility_task(&runtime, &scheduler, cc.egui_ctx.clone());

        info!(
            "Overlay ready: timeout {}s, endpoint {}",
            config.overlay.timeout_seconds, config.gallery.endpoint_url
        );

        let resize_debounce = Debounce::new(config.overlay.resize_debounce());
        Ok(Self {
            config,
            scheduler,
            session_log,
            events: rx,
            collage: CollageState::default(),
            textures: HashMap::new(),
            backdrop: None,
            last_size: egui::Vec2::ZERO,
            resize_debounce,
            rng: StdRng::from_entropy(),
            was_shown: false,
            shown_at: None,
            times_shown: 0,
        })
    }

    fn pump_gallery(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                GalleryEvent::ManifestLoaded(images) => {
                    if let Err(e) = self.session_log.log_gallery_loaded(images.len()) {
                        warn!("Failed to log gallery event: {}", e);
                    }
                    self.collage.load(images, &mut self.rng);
                    self.rebuild_cards(ctx.screen_rect().size());
                }
                GalleryEvent::ManifestFailed => {
                    if let Err(e) = self.session_log.log_gallery_failed() {
                        warn!("Failed to log gallery event: {}", e);
                    }
                    self.collage.clear();
                    self.textures.clear();
                    self.backdrop = None;
                }
                GalleryEvent::ImageReady { url, image } => {
                    if self.collage.backdrop_url.as_deref() == Some(url.as_str()) {
                        let blurred =
                            gallery::blur(&image, self.config.gallery.backdrop_blur_sigma);
                        self.backdrop = Some(ctx.load_texture(
                            format!("backdrop:{url}"),
                            to_color_image(&blurred),
                            egui::TextureOptions::LINEAR,
                        ));
                    }
                    let card = gallery::center_square_crop(&image);
                    self.textures.insert(
                        url.clone(),
                        ctx.load_texture(
                            format!("card:{url}"),
                            to_color_image(&card),
                            egui::TextureOptions::LINEAR,
                        ),
                    );
                }
                GalleryEvent::ImageFailed { .. } => {}
            }
        }
    }

    fn rebuild_cards(&mut self, size: egui::Vec2) {
        self.collage.rebuild(size, &mut self.rng);
        info!(
            "Card layout rebuilt: {} cards for {:.0}x{:.0}",
            self.collage.cards.len(),
            size.x,
            size.y
        );
    }

    fn note_transitions(&mut self) {
        let shown = self.scheduler.is_shown();
        if shown == self.was_shown {
            return;
        }
        if shown {
            self.shown_at = Some(Instant::now());
            self.times_shown += 1;
            if let Err(e) = self
                .session_log
                .log_overlay_shown(self.config.overlay.timeout_seconds)
            {
                warn!("Failed to log overlay event: {}", e);
            }
        } else {
            let visible_seconds = self
                .shown_at
                .take()
                .map(|t| t.elapsed().as_secs())
                .unwrap_or(0);
            if let Err(e) = self.session_log.log_overlay_hidden(visible_seconds) {
                warn!("Failed to log overlay event: {}", e);
            }
        }
        self.was_shown = shown;
    }

    fn handle_input(&mut self, ctx: &egui::Context) {
        let in_grace = self
            .shown_at
            .map(|t| t.elapsed() < SHOW_GRACE)
            .unwrap_or(false);

        let activity = ctx.input(|i| {
            i.raw
                .events
                .iter()
                .any(|event| counts_as_activity(event, in_grace))
        });

        if activity {
            self.scheduler.touch();
        }
    }

    fn handle_resize(&mut self, ctx: &egui::Context, now: Instant) {
        let size = ctx.screen_rect().size();
        if size != self.last_size {
            self.last_size = size;
            self.resize_debounce.trigger(now);
        }
        if self.resize_debounce.fire(now) {
            self.rebuild_cards(size);
        }
    }

    fn draw(&self, ctx: &egui::Context, shown: bool) {
        let frame = egui::Frame::none().fill(egui::Color32::BLACK);
        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            if !shown {
                return;
            }
            let screen = ui.max_rect();

            if let Some(backdrop) = &self.backdrop {
                let target = cover_rect(screen, backdrop.aspect_ratio());
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                // Dark tint stands in for the dimmed, blurred CSS backdrop.
                ui.painter()
                    .with_clip_rect(screen)
                    .image(backdrop.id(), target, uv, egui::Color32::from_gray(110));
            }

            let time = ui.input(|i| i.time);
            for card in &self.collage.cards {
                let Some(url) = self.collage.images.get(card.image_index) else {
                    continue;
                };
                let Some(texture) = self.textures.get(url) else {
                    continue;
                };
                let side = card.size * card.scale;
                let rect = egui::Rect::from_min_size(card.pos_at(time), egui::Vec2::splat(side));
                let image = egui::Image::new(texture)
                    .rotate(card.rotation_deg.to_radians(), egui::Vec2::splat(0.5))
                    .tint(egui::Color32::WHITE.gamma_multiply(card.opacity))
                    .fit_to_exact_size(egui::Vec2::splat(side));
                ui.put(rect, image);
            }
        });
    }
}

impl eframe::App for OverlayApp {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        self.pump_gallery(ctx);
        // Note the shown transition first so the pointer-motion grace window
        // is armed before this frame's input is classified.
        self.note_transitions();
        self.handle_input(ctx);
        self.handle_resize(ctx, now);

        let shown = self.was_shown;
        self.draw(ctx, shown);

        if shown {
            // Keep the drift animation moving.
            ctx.request_repaint();
        }
        if let Some(remaining) = self.resize_debounce.remaining(now) {
            ctx.request_repaint_after(remaining);
        }
    }
}

impl Drop for OverlayApp {
    fn drop(&mut self) {
        if let Err(e) = self.session_log.log_session_end(self.times_shown) {
            warn!("Failed to log session end: {}", e);
        }
    }
}

/// Mirror scheduler transitions into viewport visibility. Runs on the
/// runtime so a hidden window still wakes up when the timeout fires.
fn spawn_visibility_task(
    runtime: &tokio::runtime::Handle,
    scheduler: &IdleScheduler,
    ctx: egui::Context,
) {
    let mut rx = scheduler.subscribe();
    runtime.spawn(async move {
        loop {
            match rx.recv().await {
                Ok(OverlayState::Shown) => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(true));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                    ctx.request_repaint();
                }
                Ok(OverlayState::Hidden) => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Visible(false));
                    ctx.request_repaint();
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Whether an input event should reset the idle clock. Pointer motion is
/// ignored inside the post-show grace window; deliberate input is not.
fn counts_as_activity(event: &egui::Event, in_grace: bool) -> bool {
    if in_grace && matches!(event, egui::Event::PointerMoved(_)) {
        return false;
    }
    is_activity_event(event)
}

fn is_activity_event(event: &egui::Event) -> bool {
    matches!(
        event,
        egui::Event::PointerMoved(_)
            | egui::Event::PointerButton { .. }
            | egui::Event::Key { .. }
            | egui::Event::Text(_)
            | egui::Event::MouseWheel { .. }
            | egui::Event::Touch { .. }
    )
}

fn to_color_image(image: &DecodedImage) -> egui::ColorImage {
    egui::ColorImage::from_rgba_unmultiplied(
        [image.width as usize, image.height as usize],
        &image.rgba,
    )
}

/// Scale an image rect to cover the container, centered, preserving aspect.
fn cover_rect(container: egui::Rect, aspect: f32) -> egui::Rect {
    let size = container.size();
    let container_aspect = size.x / size.y;
    let target = if aspect >= container_aspect {
        egui::vec2(size.y * aspect, size.y)
    } else {
        egui::vec2(size.x, size.x / aspect)
    };
    egui::Rect::from_center_size(container.center(), target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_images_cover_by_height() {
        let container = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(100.0, 100.0));
        let rect = cover_rect(container, 2.0);
        assert_eq!(rect.height(), 100.0);
        assert_eq!(rect.width(), 200.0);
        assert_eq!(rect.center(), container.center());
    }

    #[test]
    fn tall_images_cover_by_width() {
        let container = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(200.0, 100.0));
        let rect = cover_rect(container, 0.5);
        assert_eq!(rect.width(), 200.0);
        assert_eq!(rect.height(), 400.0);
    }

    #[test]
    fn focus_changes_are_not_user_activity() {
        assert!(!is_activity_event(&egui::Event::WindowFocused(true)));
        assert!(is_activity_event(&egui::Event::PointerMoved(egui::pos2(
            1.0, 1.0
        ))));
    }

    #[test]
    fn pointer_motion_in_grace_is_ignored() {
        let moved = egui::Event::PointerMoved(egui::pos2(1.0, 1.0));
        assert!(!counts_as_activity(&moved, true));
        assert!(counts_as_activity(&moved, false));

        // Deliberate input dismisses even inside the grace window.
        let key = egui::Event::Key {
            key: egui::Key::Escape,
            physical_key: None,
            pressed: true,
            repeat: false,
            modifiers: egui::Modifiers::NONE,
        };
        assert!(counts_as_activity(&key, true));
    }

    fn loaded_collage() -> CollageState {
        let mut rng = StdRng::seed_from_u64(7);
        let mut collage = CollageState::default();
        collage.load(vec!["a.jpg".to_string(), "b.jpg".to_string()], &mut rng);
        collage.rebuild(egui::vec2(1920.0, 1080.0), &mut rng);
        collage
    }

    #[test]
    fn manifest_load_picks_backdrop_and_builds_cards() {
        let collage = loaded_collage();
        assert!(!collage.cards.is_empty());
        let backdrop = collage.backdrop_url.as_ref().unwrap();
        assert!(collage.images.contains(backdrop));
    }

    #[test]
    fn manifest_failure_clears_the_collage() {
        let mut collage = loaded_collage();

        collage.clear();

        assert!(collage.images.is_empty());
        assert!(collage.cards.is_empty());
        assert!(collage.backdrop_url.is_none());
    }

    #[test]
    fn rebuild_without_images_yields_no_cards() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut collage = loaded_collage();
        collage.clear();

        collage.rebuild(egui::vec2(1920.0, 1080.0), &mut rng);

        assert!(collage.cards.is_empty());
    }
}
