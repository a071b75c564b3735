//! Final clean-up of a merged record before it is handed out.
//!
//! Rules run in a fixed order: genre filtering, actor-name stripping from the
//! title, replacement maps, translation, the subtitle genre and finally the
//! display name.

use std::collections::HashSet;
use std::sync::Arc;

use metaforge_common::Record;
use tracing::{debug, warn};

use crate::config::{ResolveConfig, TranslateFields};
use crate::keys::file_stem;
use crate::translate::Translator;

pub const SUBTITLE_GENRE: &str = "中文字幕";

const SUBTITLE_SUFFIXES: &[&str] = &["-c", "-c2", "_c", "_c2"];
const DEFAULT_TITLE_FORMAT: &str = "{num} {title}";
/// Replacement targets containing this marker delete the value.
const DROP_MARKER: &str = "XXX";

pub struct PostProcessor {
    rules: ResolveConfig,
    ignored: HashSet<String>,
    translator: Option<Arc<dyn Translator>>,
    fields: TranslateFields,
}

impl PostProcessor {
    pub fn new(
        rules: ResolveConfig,
        translator: Option<Arc<dyn Translator>>,
        fields: TranslateFields,
    ) -> Self {
        let ignored = rules
            .ignore_genres
            .iter()
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty())
            .collect();
        Self {
            rules,
            ignored,
            translator,
            fields,
        }
    }

    /// Apply every rule to `record` and return its display name.
    ///
    /// `identifier` is the name the caller asked for; its suffix drives the
    /// subtitle genre.
    pub async fn apply(&self, identifier: &str, record: &mut Record) -> String {
        self.filter_genres(record);
        if self.rules.genre_ignore_actor {
            strip_trailing_actors(record);
        }
        record.original_title = record.title.clone();

        if !self.rules.genre_replace.is_empty() {
            record.genres = replace_all(&record.genres, &self.rules.genre_replace);
        }
        if !self.rules.actor_replace.is_empty() {
            record.actors = replace_all(&record.actors, &self.rules.actor_replace);
        }

        self.translate(record).await;

        if self.rules.subtitle_genre && has_subtitle_suffix(identifier) {
            if !record.genres.iter().any(|g| g == SUBTITLE_GENRE) {
                record.genres.push(SUBTITLE_GENRE.to_string());
            }
        }

        format_title(&self.rules.title_format, &self.rules.title_format_empty, record)
    }

    fn filter_genres(&self, record: &mut Record) {
        let actors: HashSet<&str> = if self.rules.genre_ignore_actor {
            record.actors.iter().map(String::as_str).collect()
        } else {
            HashSet::new()
        };
        record.genres.retain(|g| {
            !self.ignored.contains(&g.trim().to_lowercase()) && !actors.contains(g.as_str())
        });
    }

    async fn translate(&self, record: &mut Record) {
        let Some(translator) = self.translator.as_ref() else {
            return;
        };

        if self.fields.title && !record.title.trim().is_empty() {
            match translator.translate(&record.title).await {
                Some(title) if !title.trim().is_empty() => {
                    debug!(from = %record.title, to = %title, "Translated title");
                    record.title = title;
                }
                _ => warn!(title = %record.title, "Title translation failed, keeping original"),
            }
        }

        if self.fields.plot && !record.plot.trim().is_empty() {
            match translator.translate(&record.plot).await {
                Some(plot) if !plot.trim().is_empty() => record.plot = plot,
                _ => warn!(num = %record.num, "Plot translation failed, keeping original"),
            }
        }

        // Replaced genres are already in the wanted language.
        let genres_mapped = !self.rules.genre_replace.is_empty();
        if self.fields.genres && !genres_mapped && !record.genres.is_empty() {
            match translator.translate_many(&record.genres).await {
                Some(genres) => record.genres = genres,
                None => warn!(num = %record.num, "Genre translation failed, keeping original"),
            }
        }
    }
}

/// Repeatedly remove actor names from the end of the title.
fn strip_trailing_actors(record: &mut Record) {
    let mut title = record.title.trim().to_string();
    if title.is_empty() {
        return;
    }

    loop {
        let mut found = false;
        for actor in record.actors.iter().filter(|a| !a.is_empty()) {
            let Some(rest) = title.strip_suffix(actor.as_str()) else {
                continue;
            };
            let rest = rest
                .trim_end()
                .trim_end_matches([',', '，', ' '])
                .trim_end();
            if !rest.is_empty() {
                title = rest.to_string();
                found = true;
            }
        }
        if !found {
            break;
        }
    }

    record.title = title;
}

fn replace_all(values: &[String], map: &std::collections::BTreeMap<String, String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|v| map.get(v).cloned().unwrap_or_else(|| v.clone()))
        .filter(|v| !v.contains(DROP_MARKER))
        .filter(|v| seen.insert(v.to_lowercase()))
        .collect()
}

fn has_subtitle_suffix(identifier: &str) -> bool {
    let id = file_stem(identifier.trim()).to_lowercase();
    SUBTITLE_SUFFIXES.iter().any(|s| id.ends_with(s))
}

/// Render a display name from a template.
///
/// Known placeholders are `{num}`, `{title}`, `{actors}`, `{studio}`,
/// `{maker}`, `{set}`, `{director}`, `{date}`, `{year}` and `{provider}`.
/// Placeholders whose value is empty render as `empty`.
pub fn format_title(format: &str, empty: &str, record: &Record) -> String {
    let format = if format.trim().is_empty() {
        DEFAULT_TITLE_FORMAT
    } else {
        format
    };

    let year = record.year().map(|y| y.to_string()).unwrap_or_default();
    let actors = record.actors.join(", ");
    let values: [(&str, &str); 10] = [
        ("{num}", &record.num),
        ("{title}", &record.title),
        ("{actors}", &actors),
        ("{studio}", &record.studio),
        ("{maker}", &record.maker),
        ("{set}", &record.set),
        ("{director}", &record.director),
        ("{date}", &record.date),
        ("{year}", &year),
        ("{provider}", &record.provider),
    ];

    let mut name = format.to_string();
    for (placeholder, value) in values {
        if name.contains(placeholder) {
            let value = if value.trim().is_empty() { empty } else { value.trim() };
            name = name.replace(placeholder, value);
        }
    }
    name.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::testing::UpperTranslator;

    fn record() -> Record {
        let mut r = Record::new("javbus", "https://www.javbus.com/ABC-123");
        r.num = "ABC-123".to_string();
        r.title = "Summer Story Alice, Carol".to_string();
        r.plot = "a plot".to_string();
        r.date = "2021-04-01".to_string();
        r.genres = vec!["Drama".into(), "Sale".into(), "Alice".into(), "Comedy".into()];
        r.actors = vec!["Alice".into(), "Carol".into()];
        r
    }

    fn processor(rules: ResolveConfig) -> PostProcessor {
        PostProcessor::new(rules, None, TranslateFields::default())
    }

    #[tokio::test]
    async fn test_defaults_only_format() {
        let mut r = record();
        let name = processor(ResolveConfig::default()).apply("ABC-123", &mut r).await;
        assert_eq!(name, "ABC-123 Summer Story Alice, Carol");
        assert_eq!(r.genres.len(), 4);
        assert_eq!(r.original_title, r.title);
    }

    #[tokio::test]
    async fn test_ignore_genres_and_actors() {
        let rules = ResolveConfig {
            ignore_genres: vec!["sale".into()],
            genre_ignore_actor: true,
            ..ResolveConfig::default()
        };
        let mut r = record();
        processor(rules).apply("ABC-123", &mut r).await;
        assert_eq!(r.genres, vec!["Drama", "Comedy"]);
        assert_eq!(r.title, "Summer Story");
        assert_eq!(r.original_title, "Summer Story");
    }

    #[test]
    fn test_strip_never_empties_title() {
        let mut r = record();
        r.title = "Alice".to_string();
        strip_trailing_actors(&mut r);
        assert_eq!(r.title, "Alice");

        r.title = "Story Carol，Alice".to_string();
        strip_trailing_actors(&mut r);
        assert_eq!(r.title, "Story");
    }

    #[tokio::test]
    async fn test_replace_maps() {
        let mut rules = ResolveConfig::default();
        rules.genre_replace.insert("Drama".into(), "剧情".into());
        rules.genre_replace.insert("Sale".into(), "XXX".into());
        rules.actor_replace.insert("Carol".into(), "Karoru".into());

        let mut r = record();
        processor(rules).apply("ABC-123", &mut r).await;
        assert_eq!(r.genres, vec!["剧情", "Alice", "Comedy"]);
        assert_eq!(r.actors, vec!["Alice", "Karoru"]);
    }

    #[tokio::test]
    async fn test_translation() {
        let fields = TranslateFields {
            title: true,
            plot: true,
            genres: true,
        };
        let pp = PostProcessor::new(ResolveConfig::default(), Some(Arc::new(UpperTranslator)), fields);
        let mut r = record();
        pp.apply("ABC-123", &mut r).await;
        assert_eq!(r.title, "SUMMER STORY ALICE, CAROL");
        assert_eq!(r.original_title, "Summer Story Alice, Carol");
        assert_eq!(r.plot, "A PLOT");
        assert_eq!(r.genres, vec!["DRAMA", "SALE", "ALICE", "COMEDY"]);
    }

    #[tokio::test]
    async fn test_translation_failure_keeps_original() {
        let fields = TranslateFields {
            title: true,
            plot: false,
            genres: false,
        };
        let pp = PostProcessor::new(ResolveConfig::default(), Some(Arc::new(UpperTranslator)), fields);
        let mut r = record();
        r.title = "will fail".to_string();
        pp.apply("ABC-123", &mut r).await;
        assert_eq!(r.title, "will fail");
        assert_eq!(r.plot, "a plot");
    }

    #[tokio::test]
    async fn test_genre_translation_skipped_with_replace_map() {
        let mut rules = ResolveConfig::default();
        rules.genre_replace.insert("Drama".into(), "剧情".into());
        let fields = TranslateFields {
            title: false,
            plot: false,
            genres: true,
        };
        let pp = PostProcessor::new(rules, Some(Arc::new(UpperTranslator)), fields);
        let mut r = record();
        pp.apply("ABC-123", &mut r).await;
        assert_eq!(r.genres[0], "剧情");
        assert_eq!(r.genres[1], "Sale");
    }

    #[tokio::test]
    async fn test_subtitle_genre() {
        let rules = ResolveConfig {
            subtitle_genre: true,
            ..ResolveConfig::default()
        };
        let pp = processor(rules);

        for id in ["ABC-123-C", "abc-123-c2", "ABC-123_C", "/media/abc123_c2.mp4"] {
            let mut r = record();
            pp.apply(id, &mut r).await;
            pp.apply(id, &mut r).await;
            assert_eq!(r.genres.iter().filter(|g| *g == SUBTITLE_GENRE).count(), 1, "{id}");
        }

        let mut r = record();
        pp.apply("ABC-123", &mut r).await;
        assert!(!r.genres.iter().any(|g| g == SUBTITLE_GENRE));
    }

    #[test]
    fn test_format_title() {
        let r = record();
        assert_eq!(
            format_title("[{num}] {title} ({year}) {studio}", "n/a", &r),
            "[ABC-123] Summer Story Alice, Carol (2021) n/a"
        );
        assert_eq!(format_title("{actors} - {provider}", "", &r), "Alice, Carol - javbus");
        assert_eq!(format_title("", "", &r), "ABC-123 Summer Story Alice, Carol");
        assert_eq!(format_title("{num} {unknown}", "", &r), "ABC-123 {unknown}");
    }
}
