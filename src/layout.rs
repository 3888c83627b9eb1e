//! Randomized card placement and drift animation for the overlay collage.

use eframe::egui::{pos2, Pos2};
use rand::seq::SliceRandom;
use rand::Rng;

/// Floor on the number of cards regardless of screen size.
pub const MIN_CARD_COUNT: usize = 14;
/// One card per this many square pixels of screen area.
pub const AREA_PER_CARD: f32 = 70_000.0;

/// Placement and animation parameters for one collage card.
#[derive(Debug, Clone)]
pub struct CardSpec {
    /// Index into the image list.
    pub image_index: usize,
    /// Base edge length in pixels.
    pub size: f32,
    /// Drift path waypoints.
    pub start: Pos2,
    pub mid: Pos2,
    pub end: Pos2,
    pub scale: f32,
    pub rotation_deg: f32,
    pub opacity: f32,
    /// Seconds for one start -> mid -> end sweep.
    pub drift_duration: f32,
    /// Negative delays start the card mid-sweep.
    pub drift_delay: f32,
}

impl CardSpec {
    /// Card position at the given animation clock, in seconds.
    ///
    /// The card eases through start -> mid -> end and drifts back the same
    /// way, looping forever.
    pub fn pos_at(&self, time: f64) -> Pos2 {
        let cycle = ((time as f32 - self.drift_delay) / self.drift_duration).rem_euclid(2.0);
        let progress = if cycle < 1.0 { cycle } else { 2.0 - cycle };

        if progress < 0.5 {
            lerp(self.start, self.mid, smoothstep(progress * 2.0))
        } else {
            lerp(self.mid, self.end, smoothstep((progress - 0.5) * 2.0))
        }
    }
}

/// Number of cards for a given screen size.
pub fn card_count(width: f32, height: f32) -> usize {
    MIN_CARD_COUNT.max(((width * height) / AREA_PER_CARD).ceil() as usize)
}

/// Build a randomized card layout for the given screen dimensions.
///
/// The image list is shuffled once and dealt round-robin so every image
/// appears before any repeats. An empty list yields no cards.
pub fn build_layout(
    width: f32,
    height: f32,
    image_count: usize,
    rng: &mut impl Rng,
) -> Vec<CardSpec> {
    if image_count == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..image_count).collect();
    order.shuffle(rng);

    (0..card_count(width, height))
        .map(|i| CardSpec {
            image_index: order[i % order.len()],
            size: rng.gen_range(140.0..260.0),
            start: pos2(
                rng.gen_range(-0.2 * width..0.9 * width),
                rng.gen_range(-0.2 * height..0.9 * height),
            ),
            mid: pos2(
                rng.gen_range(-0.3 * width..0.95 * width),
                rng.gen_range(-0.3 * height..0.95 * height),
            ),
            end: pos2(
                rng.gen_range(-0.2 * width..0.9 * width),
                rng.gen_range(-0.2 * height..0.9 * height),
            ),
            scale: rng.gen_range(0.9..1.12),
            rotation_deg: rng.gen_range(-12.0..12.0),
            opacity: rng.gen_range(0.45..0.85),
            drift_duration: rng.gen_range(18.0..36.0),
            drift_delay: rng.gen_range(-20.0..0.0),
        })
        .collect()
}

fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: Pos2, b: Pos2, t: f32) -> Pos2 {
    pos2(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn small_screens_get_the_minimum_count() {
        // 1024x768 works out to 12 cards by area, below the floor.
        assert_eq!(card_count(1024.0, 768.0), 14);
    }

    #[test]
    fn large_screens_scale_by_area() {
        // 2560x1440 / 70000 = 52.66 -> 53
        assert_eq!(card_count(2560.0, 1440.0), 53);
    }

    #[test]
    fn empty_image_list_yields_no_cards() {
        assert!(build_layout(1920.0, 1080.0, 0, &mut rng()).is_empty());
    }

    #[test]
    fn parameters_stay_in_range() {
        let (w, h) = (1920.0, 1080.0);
        let cards = build_layout(w, h, 5, &mut rng());
        assert_eq!(cards.len(), card_count(w, h));

        for card in &cards {
            assert!(card.image_index < 5);
            assert!((140.0..260.0).contains(&card.size));
            assert!((-0.2 * w..0.9 * w).contains(&card.start.x));
            assert!((-0.2 * h..0.9 * h).contains(&card.start.y));
            assert!((-0.3 * w..0.95 * w).contains(&card.mid.x));
            assert!((-0.3 * h..0.95 * h).contains(&card.mid.y));
            assert!((-0.2 * w..0.9 * w).contains(&card.end.x));
            assert!((-0.2 * h..0.9 * h).contains(&card.end.y));
            assert!((0.9..1.12).contains(&card.scale));
            assert!((-12.0..12.0).contains(&card.rotation_deg));
            assert!((0.45..0.85).contains(&card.opacity));
            assert!((18.0..36.0).contains(&card.drift_duration));
            assert!((-20.0..0.0).contains(&card.drift_delay));
        }
    }

    #[test]
    fn every_image_is_dealt_before_repeats() {
        let cards = build_layout(1024.0, 768.0, 3, &mut rng());
        let first_three: Vec<usize> = cards.iter().take(3).map(|c| c.image_index).collect();
        let mut sorted = first_three.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2]);
        // Round-robin repeats in the same dealt order.
        assert_eq!(cards[3].image_index, first_three[0]);
    }

    #[test]
    fn drift_path_hits_its_waypoints() {
        let card = CardSpec {
            image_index: 0,
            size: 200.0,
            start: pos2(0.0, 0.0),
            mid: pos2(100.0, 50.0),
            end: pos2(200.0, 0.0),
            scale: 1.0,
            rotation_deg: 0.0,
            opacity: 0.5,
            drift_duration: 20.0,
            drift_delay: -4.0,
        };

        let at = |t: f64| card.pos_at(t);
        // Clock aligned with the delay sits at the start.
        assert_eq!(at(-4.0), card.start);
        // Halfway through a sweep is the midpoint.
        assert_eq!(at(-4.0 + 10.0), card.mid);
        // A full sweep lands on the end, then drifts back.
        assert_eq!(at(-4.0 + 20.0), card.end);
        assert_eq!(at(-4.0 + 30.0), card.mid);
        assert_eq!(at(-4.0 + 40.0), card.start);
    }

    #[test]
    fn drift_is_continuous_at_the_midpoint() {
        let card = CardSpec {
            image_index: 0,
            size: 200.0,
            start: pos2(0.0, 0.0),
            mid: pos2(100.0, 100.0),
            end: pos2(0.0, 200.0),
            scale: 1.0,
            rotation_deg: 0.0,
            opacity: 0.5,
            drift_duration: 10.0,
            drift_delay: 0.0,
        };

        let before = card.pos_at(4.999);
        let after = card.pos_at(5.001);
        assert!((before.x - after.x).abs() < 1.0);
        assert!((before.y - after.y).abs() < 1.0);
    }
}
