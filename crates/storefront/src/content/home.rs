//! Homepage settings: countdown, hero cards, new-drop block and events slider.

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::{ImageField, SanityClient};

const HOME_QUERY: &str = r#"*[_type == "countdown"][0] {
  enabled,
  endDate,
  headline,
  description,
  backgroundMobile,
  backgroundTablet,
  backgroundDesktop,
  heroFloatingCardsSource,
  heroFloatingCards,
  newDropEnabled,
  newDropImage,
  newDropTitle,
  newDropText,
  newDropButtonText,
  newDropButtonLink,
  eventsSliderImages
}"#;

const MAX_HERO_CARDS: usize = 4;
const DEFAULT_HEADLINE: &str = "Exclusive drop incoming";
const DEFAULT_DESCRIPTION: &str =
    "Get notified when the new cards go live and be the first to grab them.";
const DEFAULT_BUTTON_TEXT: &str = "Shop now";
const DEFAULT_BUTTON_LINK: &str = "/collections/all";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownSettings {
    pub enabled: bool,
    pub end_date: Option<String>,
    pub headline: String,
    pub description: String,
    pub background_mobile: Option<String>,
    pub background_tablet: Option<String>,
    pub background_desktop: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDropSettings {
    pub enabled: bool,
    pub image_url: Option<String>,
    pub title: String,
    pub text: String,
    pub button_text: String,
    pub button_link: String,
}

impl Default for NewDropSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            image_url: None,
            title: String::new(),
            text: String::new(),
            button_text: DEFAULT_BUTTON_TEXT.to_string(),
            button_link: DEFAULT_BUTTON_LINK.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SliderImage {
    pub url: String,
    pub alt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventsSliderSettings {
    pub enabled: bool,
    pub images: Vec<SliderImage>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeroCardsSource {
    #[default]
    Custom,
    Products,
}

/// Everything the homepage reads from the CMS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeSettings {
    pub countdown: CountdownSettings,
    pub hero_floating_cards_source: HeroCardsSource,
    pub hero_floating_cards: Vec<SliderImage>,
    pub new_drop: NewDropSettings,
    pub events_slider: EventsSliderSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HomeDocument {
    enabled: Option<bool>,
    end_date: Option<String>,
    headline: Option<String>,
    description: Option<String>,
    background_mobile: Option<ImageField>,
    background_tablet: Option<ImageField>,
    background_desktop: Option<ImageField>,
    hero_floating_cards_source: Option<String>,
    hero_floating_cards: Option<Vec<Option<ImageField>>>,
    new_drop_enabled: Option<bool>,
    new_drop_image: Option<ImageField>,
    new_drop_title: Option<String>,
    new_drop_text: Option<String>,
    new_drop_button_text: Option<String>,
    new_drop_button_link: Option<String>,
    events_slider_images: Option<Vec<Option<ImageField>>>,
}

/// Load homepage settings.
///
/// Falls back to [`HomeSettings::default`] when no client is configured, the
/// document is missing, or the query fails.
#[instrument(skip(client))]
pub async fn load_home_settings(client: Option<&SanityClient>) -> HomeSettings {
    let Some(client) = client else {
        return HomeSettings::default();
    };

    match client.query::<Option<HomeDocument>>(HOME_QUERY).await {
        Ok(Some(doc)) => build_settings(doc, |r| client.image_url(r)),
        Ok(None) => HomeSettings::default(),
        Err(e) => {
            warn!(error = %e, "Failed to load home settings");
            HomeSettings::default()
        }
    }
}

fn build_settings(doc: HomeDocument, image_url: impl Fn(&str) -> Option<String>) -> HomeSettings {
    let resolve = |field: Option<&ImageField>| {
        field
            .and_then(ImageField::reference)
            .and_then(&image_url)
    };

    let countdown = match (doc.enabled, doc.end_date) {
        (Some(true), Some(end_date)) => CountdownSettings {
            enabled: true,
            end_date: Some(end_date),
            headline: doc.headline.unwrap_or_else(|| DEFAULT_HEADLINE.to_string()),
            description: doc
                .description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            background_mobile: resolve(doc.background_mobile.as_ref()),
            background_tablet: resolve(doc.background_tablet.as_ref()),
            background_desktop: resolve(doc.background_desktop.as_ref()),
        },
        _ => CountdownSettings::default(),
    };

    let hero_floating_cards_source = match doc.hero_floating_cards_source.as_deref() {
        Some("products") => HeroCardsSource::Products,
        _ => HeroCardsSource::Custom,
    };

    let images = |items: Option<Vec<Option<ImageField>>>, default_alt: &str| -> Vec<SliderImage> {
        items
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter_map(|img| {
                let url = resolve(Some(&img))?;
                Some(SliderImage {
                    url,
                    alt: img.alt.unwrap_or_else(|| default_alt.to_string()),
                })
            })
            .collect()
    };

    let hero_floating_cards = images(
        doc.hero_floating_cards
            .map(|cards| cards.into_iter().take(MAX_HERO_CARDS).collect()),
        "Card",
    );

    let new_drop = if doc.new_drop_enabled == Some(true) {
        NewDropSettings {
            enabled: true,
            image_url: resolve(doc.new_drop_image.as_ref()),
            title: doc.new_drop_title.unwrap_or_else(|| "New Drop".to_string()),
            text: doc.new_drop_text.unwrap_or_default(),
            button_text: doc
                .new_drop_button_text
                .unwrap_or_else(|| DEFAULT_BUTTON_TEXT.to_string()),
            button_link: doc
                .new_drop_button_link
                .unwrap_or_else(|| DEFAULT_BUTTON_LINK.to_string()),
        }
    } else {
        NewDropSettings::default()
    };

    let slider_images = images(doc.events_slider_images, "Event foto");
    let events_slider = EventsSliderSettings {
        enabled: !slider_images.is_empty(),
        images: slider_images,
    };

    HomeSettings {
        countdown,
        hero_floating_cards_source,
        hero_floating_cards,
        new_drop,
        events_slider,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::content::image_url;
    use serde_json::json;

    fn build(value: serde_json::Value) -> HomeSettings {
        let doc: HomeDocument = serde_json::from_value(value).unwrap();
        build_settings(doc, |r| image_url("proj", "production", r))
    }

    fn image(id: &str) -> serde_json::Value {
        json!({ "asset": { "_ref": format!("image-{id}-100x100-png") } })
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let settings = build(json!({}));
        assert_eq!(settings, HomeSettings::default());
        assert_eq!(settings.new_drop.button_text, "Shop now");
        assert_eq!(settings.new_drop.button_link, "/collections/all");
    }

    #[test]
    fn test_countdown_requires_end_date() {
        let settings = build(json!({ "enabled": true }));
        assert!(!settings.countdown.enabled);

        let settings = build(json!({ "enabled": true, "endDate": "2026-12-01T00:00:00Z" }));
        assert!(settings.countdown.enabled);
        assert_eq!(settings.countdown.headline, DEFAULT_HEADLINE);
        assert_eq!(settings.countdown.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_countdown_backgrounds_resolve_to_cdn() {
        let settings = build(json!({
            "enabled": true,
            "endDate": "2026-12-01",
            "backgroundDesktop": image("desk"),
        }));
        assert_eq!(
            settings.countdown.background_desktop.as_deref(),
            Some("https://cdn.sanity.io/images/proj/production/desk-100x100.png")
        );
        assert_eq!(settings.countdown.background_mobile, None);
    }

    #[test]
    fn test_hero_cards_capped_at_four() {
        let settings = build(json!({
            "heroFloatingCardsSource": "products",
            "heroFloatingCards": [image("a"), image("b"), null, image("c"), image("d"), image("e")],
        }));
        assert_eq!(settings.hero_floating_cards_source, HeroCardsSource::Products);
        assert_eq!(settings.hero_floating_cards.len(), 3);
        assert!(settings.hero_floating_cards.iter().all(|c| c.alt == "Card"));
    }

    #[test]
    fn test_unknown_hero_source_is_custom() {
        let settings = build(json!({ "heroFloatingCardsSource": "random" }));
        assert_eq!(settings.hero_floating_cards_source, HeroCardsSource::Custom);
    }

    #[test]
    fn test_new_drop_defaults() {
        let settings = build(json!({ "newDropEnabled": true, "newDropImage": image("drop") }));
        assert!(settings.new_drop.enabled);
        assert_eq!(settings.new_drop.title, "New Drop");
        assert!(settings.new_drop.image_url.is_some());
    }

    #[test]
    fn test_events_slider_enabled_by_images() {
        let mut with_alt = image("one");
        with_alt["alt"] = json!("Booth");
        let settings = build(json!({ "eventsSliderImages": [with_alt, image("two"), { "alt": "no asset" }] }));
        assert!(settings.events_slider.enabled);
        let alts: Vec<_> = settings.events_slider.images.iter().map(|i| i.alt.as_str()).collect();
        assert_eq!(alts, ["Booth", "Event foto"]);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(HomeSettings::default()).unwrap();
        assert_eq!(json["heroFloatingCardsSource"], "custom");
        assert_eq!(json["newDrop"]["buttonLink"], "/collections/all");
        assert_eq!(json["eventsSlider"]["enabled"], false);
    }
}
