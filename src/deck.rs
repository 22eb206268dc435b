//! The slide deck and the function-call dispatcher that edits it.
//!
//! Every edit builds the next deck from the current one and publishes it in a
//! single replace, so a reader never sees a half-applied change. An edit that
//! matches no slide publishes nothing. Slugs are not checked for uniqueness on
//! insert: modify and remove act on every match, navigation on the first.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ValidationError;
use crate::navigate::Navigator;
use crate::tools::{AddSlideInput, ModifySlideInput, NavigateSlideInput, RemoveSlideInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlideTemplate {
    Title,
    TitleImage,
    TitleImageBullets,
    TitleImageParagraph,
}

impl SlideTemplate {
    pub fn supports_items(&self) -> bool {
        matches!(self, SlideTemplate::TitleImageBullets)
    }

    pub fn supports_paragraph(&self) -> bool {
        matches!(self, SlideTemplate::TitleImageParagraph)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideData {
    pub slug: String,
    pub template: SlideTemplate,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<String>,
}

impl SlideData {
    /// Checks the paragraph/items rules for a new slide.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let has_paragraph = self.paragraph.as_deref().is_some_and(|p| !p.is_empty());
        let has_items = self.items.as_ref().is_some_and(|items| !items.is_empty());

        if has_paragraph && has_items {
            return Err(ValidationError::paragraph_with_items());
        }
        if has_paragraph && !self.template.supports_paragraph() {
            return Err(ValidationError::paragraph_template());
        }
        if self.items.is_some() && !self.template.supports_items() {
            return Err(ValidationError::items_template());
        }
        Ok(())
    }
}

impl From<AddSlideInput> for SlideData {
    fn from(input: AddSlideInput) -> Self {
        Self {
            slug: input.slug,
            template: input.template,
            title: input.title,
            items: input.items,
            image_url: input.image_url,
            paragraph: input.paragraph,
        }
    }
}

/// The fixed set of functions the assistant can call on the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFunction {
    GenerateOutline,
    AddSlide,
    ModifySlide,
    RemoveSlide,
    NavigateSlide,
}

impl SlideFunction {
    pub fn name(&self) -> &'static str {
        match self {
            SlideFunction::GenerateOutline => "generateOutline",
            SlideFunction::AddSlide => "addSlide",
            SlideFunction::ModifySlide => "modifySlide",
            SlideFunction::RemoveSlide => "removeSlide",
            SlideFunction::NavigateSlide => "navigateSlide",
        }
    }
}

impl FromStr for SlideFunction {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "generateOutline" => Ok(SlideFunction::GenerateOutline),
            "addSlide" => Ok(SlideFunction::AddSlide),
            "modifySlide" => Ok(SlideFunction::ModifySlide),
            "removeSlide" => Ok(SlideFunction::RemoveSlide),
            "navigateSlide" => Ok(SlideFunction::NavigateSlide),
            other => Err(format!("Unknown function call: {}", other)),
        }
    }
}

impl fmt::Display for SlideFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a dispatched call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The deck was replaced.
    Applied,
    /// The view was moved to this position.
    Navigated(usize),
    /// No slide carries the requested slug.
    SlugNotFound,
    /// The function name is not one the deck knows.
    Ignored,
}

pub struct Deck {
    slides: watch::Sender<Vec<SlideData>>,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    pub fn new() -> Self {
        let (slides, _) = watch::channel(Vec::new());
        Self { slides }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<SlideData>> {
        self.slides.subscribe()
    }

    pub fn slides(&self) -> Vec<SlideData> {
        self.slides.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.slides.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.borrow().is_empty()
    }

    pub fn position(&self, slug: &str) -> Option<usize> {
        self.slides.borrow().iter().position(|slide| slide.slug == slug)
    }

    /// Runs one assistant function call. `arguments` is the raw JSON string
    /// the backend sent.
    pub fn dispatch(
        &mut self,
        name: &str,
        arguments: &str,
        navigator: &dyn Navigator,
    ) -> Result<DispatchOutcome, ValidationError> {
        let function = match name.parse::<SlideFunction>() {
            Ok(function) => function,
            Err(message) => {
                tracing::warn!(name, arguments, "{}", message);
                return Ok(DispatchOutcome::Ignored);
            }
        };
        tracing::info!(%function, arguments, "function call");

        match function {
            SlideFunction::GenerateOutline => {
                self.generate_outline();
                Ok(DispatchOutcome::Applied)
            }
            SlideFunction::AddSlide => {
                self.add_slide(decode::<AddSlideInput>(arguments)?)?;
                Ok(DispatchOutcome::Applied)
            }
            SlideFunction::ModifySlide => {
                self.modify_slide(decode::<ModifySlideInput>(arguments)?);
                Ok(DispatchOutcome::Applied)
            }
            SlideFunction::RemoveSlide => {
                let input = decode::<RemoveSlideInput>(arguments)?;
                self.remove_slide(&input.slug);
                Ok(DispatchOutcome::Applied)
            }
            SlideFunction::NavigateSlide => {
                let input = decode::<NavigateSlideInput>(arguments)?;
                Ok(match self.navigate_slide(&input.slug, navigator) {
                    Some(index) => DispatchOutcome::Navigated(index),
                    None => DispatchOutcome::SlugNotFound,
                })
            }
        }
    }

    pub fn generate_outline(&mut self) {
        self.slides.send_replace(Vec::new());
    }

    pub fn add_slide(&mut self, input: AddSlideInput) -> Result<(), ValidationError> {
        let slide = SlideData::from(input);
        slide.validate()?;

        let mut next = self.slides();
        next.push(slide);
        self.slides.send_replace(next);
        Ok(())
    }

    /// Applies the present fields to every slide carrying `input.slug`.
    pub fn modify_slide(&mut self, input: ModifySlideInput) {
        if self.position(&input.slug).is_none() {
            tracing::debug!(slug = %input.slug, "no slide to modify");
            return;
        }
        let next: Vec<SlideData> = self
            .slides
            .borrow()
            .iter()
            .map(|slide| {
                if slide.slug != input.slug {
                    return slide.clone();
                }
                SlideData {
                    slug: slide.slug.clone(),
                    template: input.template.unwrap_or(slide.template),
                    title: input.title.clone().unwrap_or_else(|| slide.title.clone()),
                    items: input.items.clone().or_else(|| slide.items.clone()),
                    image_url: input.image_url.clone().or_else(|| slide.image_url.clone()),
                    paragraph: input.paragraph.clone().or_else(|| slide.paragraph.clone()),
                }
            })
            .collect();
        self.slides.send_replace(next);
    }

    pub fn remove_slide(&mut self, slug: &str) {
        if self.position(slug).is_none() {
            tracing::debug!(slug, "no slide to remove");
            return;
        }
        let next: Vec<SlideData> = self
            .slides
            .borrow()
            .iter()
            .filter(|slide| slide.slug != slug)
            .cloned()
            .collect();
        self.slides.send_replace(next);
    }

    /// Moves the view to `slug`. An unknown slug leaves the view where it is.
    pub fn navigate_slide(&self, slug: &str, navigator: &dyn Navigator) -> Option<usize> {
        let index = self.position(slug);
        match index {
            Some(index) => navigator.go_to(index),
            None => tracing::debug!(slug, "no slide to navigate to"),
        }
        index
    }
}

fn decode<T: DeserializeOwned>(arguments: &str) -> Result<T, ValidationError> {
    serde_json::from_str(arguments).map_err(ValidationError::malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SlideField, ValidationKind};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNavigator {
        calls: Mutex<Vec<usize>>,
    }

    impl Navigator for RecordingNavigator {
        fn go_to(&self, index: usize) {
            self.calls.lock().unwrap().push(index);
        }
    }

    fn bullets(slug: &str, items: &[&str]) -> AddSlideInput {
        AddSlideInput {
            slug: slug.to_string(),
            template: SlideTemplate::TitleImageBullets,
            title: format!("Slide {}", slug),
            items: Some(items.iter().map(|item| item.to_string()).collect()),
            image_url: Some(format!("https://img.example/{}.png", slug)),
            paragraph: None,
        }
    }

    fn slugs(deck: &Deck) -> Vec<String> {
        deck.slides().into_iter().map(|slide| slide.slug).collect()
    }

    #[test]
    fn paragraph_with_items_is_rejected_and_deck_unchanged() {
        let mut deck = Deck::new();
        deck.add_slide(bullets("s1", &["a"])).unwrap();

        let mut input = bullets("s2", &["a", "b"]);
        input.paragraph = Some("text".to_string());
        let err = deck.add_slide(input).unwrap_err();

        assert_eq!(err.kind, ValidationKind::ParagraphWithItems);
        assert_eq!(err.field, SlideField::Paragraph);
        assert_eq!(slugs(&deck), vec!["s1"]);
    }

    #[test]
    fn items_require_bullet_template() {
        for template in [
            SlideTemplate::Title,
            SlideTemplate::TitleImage,
            SlideTemplate::TitleImageParagraph,
        ] {
            let mut deck = Deck::new();
            let mut input = bullets("s1", &["a"]);
            input.template = template;

            let err = deck.add_slide(input).unwrap_err();
            assert_eq!(err.kind, ValidationKind::TemplateMismatch);
            assert_eq!(err.field, SlideField::Items);
            assert!(deck.is_empty());
        }
    }

    #[test]
    fn paragraph_requires_paragraph_template() {
        let mut deck = Deck::new();
        let input = AddSlideInput {
            slug: "p".to_string(),
            template: SlideTemplate::TitleImage,
            title: "Prose".to_string(),
            items: None,
            image_url: None,
            paragraph: Some("Once upon a time".to_string()),
        };
        let err = deck.add_slide(input.clone()).unwrap_err();
        assert_eq!(err.field, SlideField::Paragraph);
        assert_eq!(
            err.to_string(),
            "If you add a paragraph of text, you need to pick a template that supports a paragraph"
        );

        let input = AddSlideInput {
            template: SlideTemplate::TitleImageParagraph,
            ..input
        };
        deck.add_slide(input).unwrap();
        assert_eq!(deck.len(), 1);
    }

    #[test]
    fn modify_changes_only_supplied_fields() {
        let mut deck = Deck::new();
        deck.add_slide(bullets("s1", &["a", "b"])).unwrap();
        let before = deck.slides()[0].clone();

        deck.modify_slide(ModifySlideInput {
            slug: "s1".to_string(),
            title: Some("Renamed".to_string()),
            ..Default::default()
        });

        let after = deck.slides()[0].clone();
        assert_eq!(after.title, "Renamed");
        assert_eq!(
            SlideData {
                title: before.title.clone(),
                ..after
            },
            before
        );
    }

    #[test]
    fn modify_unknown_slug_is_a_no_op() {
        let mut deck = Deck::new();
        deck.add_slide(bullets("s1", &["a"])).unwrap();
        let before = deck.slides();
        let mut slides = deck.subscribe();
        slides.borrow_and_update();

        deck.modify_slide(ModifySlideInput {
            slug: "missing".to_string(),
            title: Some("x".to_string()),
            ..Default::default()
        });
        assert_eq!(deck.slides(), before);
        assert!(!slides.has_changed().unwrap());
    }

    #[test]
    fn remove_unknown_slug_keeps_length_and_order() {
        let mut deck = Deck::new();
        for slug in ["s1", "s2", "s3"] {
            deck.add_slide(bullets(slug, &["a"])).unwrap();
        }
        let mut slides = deck.subscribe();
        slides.borrow_and_update();

        deck.remove_slide("nope");
        assert_eq!(slugs(&deck), vec!["s1", "s2", "s3"]);
        assert!(!slides.has_changed().unwrap());

        deck.remove_slide("s2");
        assert_eq!(slugs(&deck), vec!["s1", "s3"]);
        assert!(slides.has_changed().unwrap());
    }

    #[test]
    fn navigate_resolves_current_position() {
        let mut deck = Deck::new();
        for slug in ["s1", "s2", "s3", "s4"] {
            deck.add_slide(bullets(slug, &["a"])).unwrap();
        }
        deck.remove_slide("s4");

        let navigator = RecordingNavigator::default();
        assert_eq!(deck.navigate_slide("s3", &navigator), Some(2));
        assert_eq!(deck.navigate_slide("s9", &navigator), None);
        assert_eq!(*navigator.calls.lock().unwrap(), vec![2]);
    }

    #[test]
    fn duplicate_slugs_are_accepted_and_first_match_wins() {
        let mut deck = Deck::new();
        deck.add_slide(bullets("s1", &["a", "b"])).unwrap();
        assert_eq!(deck.len(), 1);
        deck.add_slide(bullets("s1", &["c"])).unwrap();
        assert_eq!(deck.len(), 2);
        assert_eq!(deck.position("s1"), Some(0));

        deck.modify_slide(ModifySlideInput {
            slug: "s1".to_string(),
            title: Some("Renamed".to_string()),
            ..Default::default()
        });
        assert!(deck.slides().iter().all(|slide| slide.title == "Renamed"));
    }

    #[test]
    fn dispatch_decodes_wire_arguments() {
        let mut deck = Deck::new();
        let navigator = RecordingNavigator::default();

        let outcome = deck
            .dispatch(
                "addSlide",
                r#"{"slug":"intro","template":"title_image_bullets","title":"Intro","items":["a"],"imageUrl":"https://x/y.png"}"#,
                &navigator,
            )
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Applied);
        assert_eq!(deck.slides()[0].image_url.as_deref(), Some("https://x/y.png"));

        let outcome = deck
            .dispatch("navigateSlide", r#"{"slug":"intro"}"#, &navigator)
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Navigated(0));

        let outcome = deck.dispatch("generateOutline", "{}", &navigator).unwrap();
        assert_eq!(outcome, DispatchOutcome::Applied);
        assert!(deck.is_empty());
    }

    #[test]
    fn dispatch_ignores_unknown_names() {
        let mut deck = Deck::new();
        let navigator = RecordingNavigator::default();
        let outcome = deck.dispatch("deleteEverything", "{}", &navigator).unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
    }

    #[test]
    fn dispatch_rejects_malformed_arguments() {
        let mut deck = Deck::new();
        let navigator = RecordingNavigator::default();
        let err = deck
            .dispatch("addSlide", r#"{"slug": 3}"#, &navigator)
            .unwrap_err();
        assert_eq!(err.kind, ValidationKind::MalformedArguments);
        assert!(deck.is_empty());
    }

    #[test]
    fn subscribers_see_whole_deck_replacements() {
        let mut deck = Deck::new();
        let mut rx = deck.subscribe();
        deck.add_slide(bullets("s1", &["a"])).unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
