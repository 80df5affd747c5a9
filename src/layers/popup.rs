use egui::Color32;

use crate::map::layer::LayerStyle;
use crate::maps_api::arcgis::Attributes;

/// One node of a parsed popup template. Text-bearing nodes carry the index
/// of the slot they render, assigned left to right during parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum PopupNode {
    Text { slot: usize, bold: bool },
    Link { link_slot: usize, text_slot: usize, bold: bool },
    Break,
    ZoomToFit,
    Literal(String),
}

/// Parsed form of the pipe-delimited popup template mini-language:
/// `text`, `boldtext`, `link`, `boldlink`, `br`, `ztf`, anything else is a
/// literal.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupTemplate {
    nodes: Vec<PopupNode>,
    text_slots: usize,
    link_slots: usize,
}

impl PopupTemplate {
    pub fn parse(template: &str) -> Self {
        let mut nodes = Vec::new();
        let mut text_slots = 0;
        let mut link_slots = 0;

        for token in template.split('|') {
            match token {
                "text" | "boldtext" => {
                    nodes.push(PopupNode::Text {
                        slot: text_slots,
                        bold: token == "boldtext",
                    });
                    text_slots += 1;
                }
                "link" | "boldlink" => {
                    nodes.push(PopupNode::Link {
                        link_slot: link_slots,
                        text_slot: text_slots,
                        bold: token == "boldlink",
                    });
                    link_slots += 1;
                    text_slots += 1;
                }
                "br" => nodes.push(PopupNode::Break),
                "ztf" => nodes.push(PopupNode::ZoomToFit),
                other => nodes.push(PopupNode::Literal(other.to_string())),
            }
        }

        Self {
            nodes,
            text_slots,
            link_slots,
        }
    }

    pub fn nodes(&self) -> &[PopupNode] {
        &self.nodes
    }

    pub fn instantiate(&self) -> PopupContent {
        PopupContent {
            template: self.clone(),
            texts: vec![String::new(); self.text_slots],
            links: vec![LinkSlot::default(); self.link_slots],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkSlot {
    pub url: String,
}

impl LinkSlot {
    /// Rewrite the link host, keeping path and query. Used by `show`
    /// implementations that force a canonical mirror.
    pub fn force_host(&mut self, host: &str) {
        if let Some(index) = self.url.find("://") {
            let rest = &self.url[index + 3..];
            let path = rest.find('/').map(|i| &rest[i..]).unwrap_or("");
            self.url = format!("https://{}{}", host, path);
        }
    }
}

/// A filled-in popup: the template plus positional text and link values.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupContent {
    template: PopupTemplate,
    texts: Vec<String>,
    links: Vec<LinkSlot>,
}

impl PopupContent {
    /// Assign values positionally to text slot 0, 1, ... Extra values are
    /// ignored, missing ones leave the slot untouched.
    pub fn set_text<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (slot, value) in self.texts.iter_mut().zip(values) {
            *slot = value.into();
        }
    }

    /// Set link slot 0 and hand it back for further mutation.
    pub fn set_link(&mut self, url: impl Into<String>) -> Option<&mut LinkSlot> {
        self.set_link_at(0, url)
    }

    pub fn set_link_at(&mut self, slot: usize, url: impl Into<String>) -> Option<&mut LinkSlot> {
        let link = self.links.get_mut(slot)?;
        link.url = url.into();
        Some(link)
    }

    pub fn text(&self, slot: usize) -> &str {
        self.texts.get(slot).map(String::as_str).unwrap_or("")
    }

    pub fn link(&self, slot: usize) -> &str {
        self.links.get(slot).map(|l| l.url.as_str()).unwrap_or("")
    }

    /// Flatten into paint-ready runs for the UI layer.
    pub fn runs(&self) -> Vec<PopupRun> {
        self.template
            .nodes
            .iter()
            .map(|node| match node {
                PopupNode::Text { slot, bold } => PopupRun::Text {
                    text: self.text(*slot).to_string(),
                    bold: *bold,
                    link: None,
                },
                PopupNode::Link {
                    link_slot,
                    text_slot,
                    bold,
                } => PopupRun::Text {
                    text: self.text(*text_slot).to_string(),
                    bold: *bold,
                    link: Some(self.link(*link_slot).to_string()),
                },
                PopupNode::Break => PopupRun::Break,
                PopupNode::ZoomToFit => PopupRun::ZoomToFit,
                PopupNode::Literal(text) => PopupRun::Text {
                    text: text.clone(),
                    bold: false,
                    link: None,
                },
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopupRun {
    Text {
        text: String,
        bold: bool,
        link: Option<String>,
    },
    Break,
    ZoomToFit,
}

/// What a `show` implementation returns: the outline color, or a full style
/// override when weight/fill matter too.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PopupStyle {
    Color(Color32),
    Style(LayerStyle),
}

impl PopupStyle {
    pub fn to_style(self) -> LayerStyle {
        match self {
            PopupStyle::Color(color) => LayerStyle::with_color(color),
            PopupStyle::Style(style) => style,
        }
    }
}

/// Fills a popup from one feature's attributes and picks the outline style.
/// Plain function pointers so sibling sources can share one implementation.
pub type ShowFn = fn(&mut PopupContent, &Attributes) -> PopupStyle;
