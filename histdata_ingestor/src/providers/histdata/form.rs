use std::sync::LazyLock;

use indexmap::IndexMap;
use scraper::{Html, Selector};
use snafu::{OptionExt, ResultExt};
use url::Url;

use crate::providers::{FormNotFoundSnafu, InvalidActionSnafu, MissingFieldSnafu, ResolutionError};

/// `id` of the download form on every monthly page.
pub const FORM_ID: &str = "file_down";

/// Hidden inputs the download POST must carry, in submission order.
pub const REQUIRED_FIELDS: [&str; 6] = ["tk", "date", "datemonth", "platform", "timeframe", "fxpair"];

static FORM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form#file_down").expect("static selector"));
static NAMED_INPUT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name][value]").expect("static selector"));

/// A resolved download form, ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadForm {
    /// Absolute submit URL.
    pub action: Url,
    /// Exactly [`REQUIRED_FIELDS`], in that order.
    pub fields: Vec<(String, String)>,
}

/// Extracts the download form from a monthly page.
///
/// A relative `action` is resolved against `page_url`; a missing one means
/// the form posts back to the page itself. Inputs without both a `name` and a
/// `value` are ignored, and a repeated name keeps its last value.
pub fn parse_download_form(html: &str, page_url: &Url) -> Result<DownloadForm, ResolutionError> {
    let document = Html::parse_document(html);
    let form = document.select(&FORM).next().context(FormNotFoundSnafu {
        url: page_url.as_str(),
        form_id: FORM_ID,
    })?;

    let action = match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => page_url
            .join(action)
            .context(InvalidActionSnafu { action })?,
        _ => page_url.clone(),
    };

    let inputs: IndexMap<&str, &str> = form
        .select(&NAMED_INPUT)
        .filter_map(|input| Some((input.value().attr("name")?, input.value().attr("value")?)))
        .collect();

    let fields = REQUIRED_FIELDS
        .iter()
        .map(|&field| {
            let value = inputs.get(field).context(MissingFieldSnafu {
                field,
                found: inputs.keys().map(|k| k.to_string()).collect::<Vec<_>>(),
            })?;
            Ok((field.to_string(), value.to_string()))
        })
        .collect::<Result<Vec<_>, ResolutionError>>()?;

    Ok(DownloadForm { action, fields })
}
