//! Diagram presence stage. Runs Canny edge detection over the page and treats
//! a dense edge map as evidence of a drawn figure. Diagram-bearing answers
//! keep full marks weight; text-only answers are scored at the reduced
//! multiplier by the aggregation step.

use image::GenericImageView;
use imageproc::edges::canny;
use tracing::warn;

const EDGE_DENSITY_THRESHOLD: f64 = 0.05;
const CANNY_LOW: f32 = 80.0;
const CANNY_HIGH: f32 = 160.0;

const DIAGRAM_MULTIPLIER: f64 = 1.0;
const NO_DIAGRAM_MULTIPLIER: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub(crate) struct DiagramOutcome {
    pub(crate) has_diagram: bool,
    pub(crate) edge_density: f64,
    pub(crate) marks_multiplier: f64,
}

pub(crate) struct DiagramStage;

impl DiagramStage {
    /// Never errors. Unreadable images classify as no-diagram with zero edge
    /// density.
    pub(crate) async fn analyze(&self, image: &[u8]) -> DiagramOutcome {
        let bytes = image.to_vec();
        let density = tokio::task::spawn_blocking(move || edge_density(&bytes)).await;

        match density {
            Ok(Some(density)) => from_density(density),
            Ok(None) => {
                warn!("image could not be decoded for diagram analysis");
                fallback()
            }
            Err(err) => {
                warn!(error = %err, "diagram analysis task failed");
                fallback()
            }
        }
    }
}

/// Fraction of pixels the Canny detector marks as edges.
fn edge_density(image: &[u8]) -> Option<f64> {
    let decoded = image::load_from_memory(image).ok()?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let gray = decoded.to_luma8();
    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
    let edge_pixels = edges.pixels().filter(|pixel| pixel.0[0] > 0).count();

    Some(edge_pixels as f64 / (width as f64 * height as f64))
}

fn from_density(density: f64) -> DiagramOutcome {
    let has_diagram = density > EDGE_DENSITY_THRESHOLD;
    DiagramOutcome {
        has_diagram,
        edge_density: density,
        marks_multiplier: if has_diagram {
            DIAGRAM_MULTIPLIER
        } else {
            NO_DIAGRAM_MULTIPLIER
        },
    }
}

fn fallback() -> DiagramOutcome {
    DiagramOutcome {
        has_diagram: false,
        edge_density: 0.0,
        marks_multiplier: NO_DIAGRAM_MULTIPLIER,
    }
}
