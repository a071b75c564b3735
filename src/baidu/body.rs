//! Human body analysis used to find the horizontal point of interest of a
//! cover image.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use super::BaiduClient;
use crate::images::PointLocator;

const BODY_ANALYSIS_PATH: &str = "rest/2.0/image-classify/v1/body_analysis";
const MIN_PERSON_SCORE: f64 = 0.1;

#[derive(Debug, Default, Deserialize)]
struct BodyAnalysisResponse {
    #[serde(default)]
    person_info: Vec<Person>,
}

#[derive(Debug, Default, Deserialize)]
struct Person {
    #[serde(default)]
    body_parts: BodyParts,
    location: Option<Location>,
}

#[derive(Debug, Default, Deserialize)]
struct BodyParts {
    nose: Option<Keypoint>,
    left_mouth_corner: Option<Keypoint>,
    right_mouth_corner: Option<Keypoint>,
    top_head: Option<Keypoint>,
    neck: Option<Keypoint>,
}

#[derive(Debug, Default, Deserialize)]
struct Keypoint {
    #[serde(default)]
    x: f64,
}

#[derive(Debug, Default, Deserialize)]
struct Location {
    #[serde(default)]
    left: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    #[serde(default)]
    score: f64,
}

impl Location {
    fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// [`PointLocator`] backed by the body analysis endpoint.
pub struct BodyAnalyzer {
    client: Arc<BaiduClient>,
}

impl BodyAnalyzer {
    pub fn new(client: Arc<BaiduClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PointLocator for BodyAnalyzer {
    async fn locate(&self, image: &[u8]) -> Option<f64> {
        let form = [("image", STANDARD.encode(image))];
        let resp: BodyAnalysisResponse = self.client.post_form(BODY_ANALYSIS_PATH, &form).await?;
        let x = select_point(&resp.person_info);
        debug!(persons = resp.person_info.len(), x = ?x, "Body analysis finished");
        x
    }
}

/// Pick the horizontal anchor of the main person.
///
/// The main person is the largest confidently detected one. In a crowded
/// frame where that person stands far to the right, twice their left edge
/// is used instead of a facial keypoint.
fn select_point(persons: &[Person]) -> Option<f64> {
    let mut main: Option<(&Person, &Location)> = None;
    for person in persons {
        let Some(loc) = person.location.as_ref().filter(|l| l.score >= MIN_PERSON_SCORE) else {
            continue;
        };
        if main.map_or(true, |(_, best)| loc.area() > best.area()) {
            main = Some((person, loc));
        }
    }

    let person = match main {
        Some((person, loc)) => {
            let to_left = persons
                .iter()
                .filter(|o| o.location.as_ref().is_some_and(|l| l.left < loc.left))
                .count();
            let to_right = persons
                .iter()
                .filter(|o| o.location.as_ref().is_some_and(|l| l.left > loc.left))
                .count();
            if to_left > 15 && to_right < 10 {
                return Some(loc.left * 2.0);
            }
            person
        }
        None => persons.first()?,
    };

    let parts = &person.body_parts;
    let x_of = |p: &Option<Keypoint>| p.as_ref().map(|k| k.x).filter(|x| *x > 0.0);

    x_of(&parts.nose)
        .or_else(|| match (x_of(&parts.left_mouth_corner), x_of(&parts.right_mouth_corner)) {
            (Some(l), Some(r)) => Some((l + r) / 2.0),
            _ => None,
        })
        .or_else(|| x_of(&parts.top_head))
        .or_else(|| x_of(&parts.neck))
}
