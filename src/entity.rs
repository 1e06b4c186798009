//! Entity extraction from free-text customer messages.
//!
//! Turns `"do you have a white tiguan under 32k?"` into a flat
//! [`VehicleQuery`] by matching the lower-cased message against fixed
//! vocabularies (makes, models, trims, colors, body types, features) and a
//! few regexes (years, budget). No model calls are involved.
//!
//! # Matching rules
//!
//! - Vocabulary terms match on word boundaries, longest term first, so
//!   `"land rover"` beats `"rover"` and `"rs"` never matches inside
//!   `"porsche"`.
//! - A model names its make only when the message did not name one.
//! - Models that double as everyday words (`"is"`, `"edge"`, `"soul"`, …)
//!   only count when their make is also named (`"lexus is"`, `"kia soul"`).
//! - Numeric models (`"500"`, `"911"`) are skipped when they are part of a
//!   price such as `"$32,500"` or `"500k"`.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Structured vehicle query extracted from a customer message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VehicleQuery {
    pub make: Option<String>,
    pub model: Option<String>,
    pub trim: Option<String>,
    pub year_min: Option<i64>,
    pub year_max: Option<i64>,
    pub color: Option<String>,
    pub budget_max: Option<f64>,
    pub body_type: Option<String>,
    pub features: Vec<String>,
}

impl VehicleQuery {
    /// True when the query is specific enough to pre-filter inventory.
    pub fn has_strong_signals(&self) -> bool {
        self.make.is_some()
            || self.model.is_some()
            || self.year_min.is_some()
            || self.year_max.is_some()
            || self.budget_max.is_some()
            || self.body_type.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == VehicleQuery::default()
    }
}

// ============ Vocabularies ============

const MAKE_SYNONYMS: &[(&str, &str)] = &[
    ("vw", "volkswagen"),
    ("volkswagen", "volkswagen"),
    ("bmw", "bmw"),
    ("mercedes", "mercedes-benz"),
    ("mercedes-benz", "mercedes-benz"),
    ("benz", "mercedes-benz"),
    ("toyota", "toyota"),
    ("honda", "honda"),
    ("nissan", "nissan"),
    ("ford", "ford"),
    ("chevrolet", "chevrolet"),
    ("chevy", "chevrolet"),
    ("hyundai", "hyundai"),
    ("kia", "kia"),
    ("mazda", "mazda"),
    ("subaru", "subaru"),
    ("jeep", "jeep"),
    ("dodge", "dodge"),
    ("chrysler", "chrysler"),
    ("audi", "audi"),
    ("lexus", "lexus"),
    ("acura", "acura"),
    ("infiniti", "infiniti"),
    ("buick", "buick"),
    ("cadillac", "cadillac"),
    ("lincoln", "lincoln"),
    ("volvo", "volvo"),
    ("mini", "mini"),
    ("fiat", "fiat"),
    ("alfa", "alfa romeo"),
    ("alfa romeo", "alfa romeo"),
    ("porsche", "porsche"),
    ("jaguar", "jaguar"),
    ("land rover", "land rover"),
    ("range rover", "land rover"),
    ("maserati", "maserati"),
    ("ferrari", "ferrari"),
    ("lamborghini", "lamborghini"),
    ("bentley", "bentley"),
    ("rolls", "rolls royce"),
    ("rolls royce", "rolls royce"),
    ("aston", "aston martin"),
    ("aston martin", "aston martin"),
];

/// `(model, make)` pairs.
const MODELS: &[(&str, &str)] = &[
    // Toyota
    ("camry", "toyota"),
    ("corolla", "toyota"),
    ("rav4", "toyota"),
    ("highlander", "toyota"),
    ("tacoma", "toyota"),
    ("tundra", "toyota"),
    ("prius", "toyota"),
    ("sienna", "toyota"),
    ("avalon", "toyota"),
    ("yaris", "toyota"),
    ("venza", "toyota"),
    ("4runner", "toyota"),
    ("sequoia", "toyota"),
    ("land cruiser", "toyota"),
    // Honda
    ("civic", "honda"),
    ("accord", "honda"),
    ("cr-v", "honda"),
    ("crv", "honda"),
    ("pilot", "honda"),
    ("odyssey", "honda"),
    ("ridgeline", "honda"),
    ("fit", "honda"),
    ("insight", "honda"),
    ("passport", "honda"),
    ("hr-v", "honda"),
    ("element", "honda"),
    // Nissan
    ("altima", "nissan"),
    ("sentra", "nissan"),
    ("rogue", "nissan"),
    ("murano", "nissan"),
    ("pathfinder", "nissan"),
    ("frontier", "nissan"),
    ("titan", "nissan"),
    ("versa", "nissan"),
    ("maxima", "nissan"),
    ("armada", "nissan"),
    ("quest", "nissan"),
    // Ford
    ("f-150", "ford"),
    ("f150", "ford"),
    ("f-250", "ford"),
    ("f-350", "ford"),
    ("mustang", "ford"),
    ("escape", "ford"),
    ("explorer", "ford"),
    ("edge", "ford"),
    ("expedition", "ford"),
    ("ranger", "ford"),
    ("bronco", "ford"),
    ("maverick", "ford"),
    // Chevrolet
    ("silverado", "chevrolet"),
    ("tahoe", "chevrolet"),
    ("suburban", "chevrolet"),
    ("equinox", "chevrolet"),
    ("traverse", "chevrolet"),
    ("malibu", "chevrolet"),
    ("impala", "chevrolet"),
    ("camaro", "chevrolet"),
    ("corvette", "chevrolet"),
    ("colorado", "chevrolet"),
    ("bolt", "chevrolet"),
    // Hyundai
    ("tucson", "hyundai"),
    ("santa fe", "hyundai"),
    ("palisade", "hyundai"),
    ("elantra", "hyundai"),
    ("sonata", "hyundai"),
    ("accent", "hyundai"),
    ("veloster", "hyundai"),
    ("kona", "hyundai"),
    ("ioniq", "hyundai"),
    ("nexo", "hyundai"),
    // Kia
    ("sportage", "kia"),
    ("sorento", "kia"),
    ("telluride", "kia"),
    ("forte", "kia"),
    ("rio", "kia"),
    ("soul", "kia"),
    ("stinger", "kia"),
    ("k5", "kia"),
    ("niro", "kia"),
    ("ev6", "kia"),
    // Mazda
    ("cx-5", "mazda"),
    ("cx-9", "mazda"),
    ("cx-30", "mazda"),
    ("cx-50", "mazda"),
    ("mazda3", "mazda"),
    ("mazda6", "mazda"),
    ("mx-5", "mazda"),
    ("miata", "mazda"),
    ("mx-30", "mazda"),
    // Subaru
    ("outback", "subaru"),
    ("forester", "subaru"),
    ("crosstrek", "subaru"),
    ("impreza", "subaru"),
    ("legacy", "subaru"),
    ("wrx", "subaru"),
    ("brz", "subaru"),
    ("ascent", "subaru"),
    // Jeep
    ("wrangler", "jeep"),
    ("grand cherokee", "jeep"),
    ("cherokee", "jeep"),
    ("compass", "jeep"),
    ("renegade", "jeep"),
    ("gladiator", "jeep"),
    ("commander", "jeep"),
    // Dodge
    ("challenger", "dodge"),
    ("charger", "dodge"),
    ("durango", "dodge"),
    ("journey", "dodge"),
    ("avenger", "dodge"),
    ("caliber", "dodge"),
    ("neon", "dodge"),
    // Chrysler
    ("300", "chrysler"),
    ("200", "chrysler"),
    ("pacifica", "chrysler"),
    ("voyager", "chrysler"),
    ("pt cruiser", "chrysler"),
    ("sebring", "chrysler"),
    // Audi
    ("a3", "audi"),
    ("a4", "audi"),
    ("a6", "audi"),
    ("a8", "audi"),
    ("q3", "audi"),
    ("q5", "audi"),
    ("q7", "audi"),
    ("q8", "audi"),
    ("tt", "audi"),
    ("rs", "audi"),
    ("s3", "audi"),
    ("s4", "audi"),
    ("s6", "audi"),
    ("s8", "audi"),
    ("e-tron", "audi"),
    // BMW
    ("3 series", "bmw"),
    ("5 series", "bmw"),
    ("7 series", "bmw"),
    ("x1", "bmw"),
    ("x3", "bmw"),
    ("x5", "bmw"),
    ("x7", "bmw"),
    ("z4", "bmw"),
    ("m3", "bmw"),
    ("m5", "bmw"),
    ("m8", "bmw"),
    ("i4", "bmw"),
    // Mercedes-Benz
    ("a-class", "mercedes-benz"),
    ("c-class", "mercedes-benz"),
    ("e-class", "mercedes-benz"),
    ("s-class", "mercedes-benz"),
    ("gla", "mercedes-benz"),
    ("glb", "mercedes-benz"),
    ("glc", "mercedes-benz"),
    ("gle", "mercedes-benz"),
    ("gls", "mercedes-benz"),
    ("cla", "mercedes-benz"),
    ("cls", "mercedes-benz"),
    // Lexus
    ("es", "lexus"),
    ("ls", "lexus"),
    ("gs", "lexus"),
    ("is", "lexus"),
    ("rc", "lexus"),
    ("lc", "lexus"),
    ("nx", "lexus"),
    ("rx", "lexus"),
    ("gx", "lexus"),
    ("lx", "lexus"),
    ("ux", "lexus"),
    ("rz", "lexus"),
    // Acura
    ("tl", "acura"),
    ("tlx", "acura"),
    ("tsx", "acura"),
    ("mdx", "acura"),
    ("rdx", "acura"),
    ("ilx", "acura"),
    ("nsx", "acura"),
    ("integra", "acura"),
    ("legend", "acura"),
    // Infiniti
    ("q50", "infiniti"),
    ("q60", "infiniti"),
    ("qx50", "infiniti"),
    ("qx60", "infiniti"),
    ("qx80", "infiniti"),
    ("g37", "infiniti"),
    ("fx35", "infiniti"),
    // Buick
    ("encore", "buick"),
    ("enclave", "buick"),
    ("envision", "buick"),
    ("lacrosse", "buick"),
    ("regal", "buick"),
    ("verano", "buick"),
    // Cadillac
    ("cts", "cadillac"),
    ("ats", "cadillac"),
    ("xts", "cadillac"),
    ("xt4", "cadillac"),
    ("xt5", "cadillac"),
    ("xt6", "cadillac"),
    ("escalade", "cadillac"),
    ("escalade esv", "cadillac"),
    ("ct4", "cadillac"),
    ("ct5", "cadillac"),
    ("ct6", "cadillac"),
    // Lincoln
    ("mkz", "lincoln"),
    ("mkc", "lincoln"),
    ("mkx", "lincoln"),
    ("navigator", "lincoln"),
    ("continental", "lincoln"),
    ("aviator", "lincoln"),
    ("corsair", "lincoln"),
    ("nautilus", "lincoln"),
    // Volvo
    ("s60", "volvo"),
    ("s90", "volvo"),
    ("v60", "volvo"),
    ("v90", "volvo"),
    ("xc40", "volvo"),
    ("xc60", "volvo"),
    ("xc90", "volvo"),
    // Mini
    ("cooper", "mini"),
    ("countryman", "mini"),
    ("clubman", "mini"),
    ("convertible", "mini"),
    ("hardtop", "mini"),
    // Fiat
    ("500", "fiat"),
    ("500l", "fiat"),
    ("500x", "fiat"),
    ("500e", "fiat"),
    ("124 spider", "fiat"),
    // Alfa Romeo
    ("giulia", "alfa romeo"),
    ("stelvio", "alfa romeo"),
    ("tonale", "alfa romeo"),
    ("4c", "alfa romeo"),
    ("spider", "alfa romeo"),
    // Porsche
    ("911", "porsche"),
    ("cayenne", "porsche"),
    ("macan", "porsche"),
    ("panamera", "porsche"),
    ("cayman", "porsche"),
    ("boxster", "porsche"),
    ("taycan", "porsche"),
    ("carrera", "porsche"),
    // Jaguar
    ("xe", "jaguar"),
    ("xf", "jaguar"),
    ("xj", "jaguar"),
    ("f-type", "jaguar"),
    ("f-pace", "jaguar"),
    ("e-pace", "jaguar"),
    ("i-pace", "jaguar"),
    // Land Rover
    ("discovery", "land rover"),
    ("defender", "land rover"),
    ("range rover sport", "land rover"),
    ("range rover evoque", "land rover"),
    ("range rover velar", "land rover"),
    // Maserati
    ("ghibli", "maserati"),
    ("quattroporte", "maserati"),
    ("levante", "maserati"),
    ("grecale", "maserati"),
    ("mc20", "maserati"),
    ("granturismo", "maserati"),
    // Ferrari
    ("488", "ferrari"),
    ("f8", "ferrari"),
    ("812", "ferrari"),
    ("sf90", "ferrari"),
    ("roma", "ferrari"),
    ("portofino", "ferrari"),
    // Lamborghini
    ("huracan", "lamborghini"),
    ("aventador", "lamborghini"),
    ("urus", "lamborghini"),
    ("gallardo", "lamborghini"),
    // Bentley
    ("continental", "bentley"),
    ("flying spur", "bentley"),
    ("bentayga", "bentley"),
    // Rolls Royce
    ("phantom", "rolls royce"),
    ("ghost", "rolls royce"),
    ("wraith", "rolls royce"),
    ("dawn", "rolls royce"),
    ("cullinan", "rolls royce"),
    // Aston Martin
    ("db11", "aston martin"),
    ("dbx", "aston martin"),
    ("vantage", "aston martin"),
    ("dbs", "aston martin"),
    // Volkswagen
    ("tiguan", "volkswagen"),
    ("atlas", "volkswagen"),
    ("golf", "volkswagen"),
    ("jetta", "volkswagen"),
    ("passat", "volkswagen"),
    ("arteon", "volkswagen"),
    ("id.4", "volkswagen"),
    ("taos", "volkswagen"),
    ("touareg", "volkswagen"),
];

/// Models that are also everyday words; they need their make named alongside.
/// Alternate model spellings and the form inventory rows use.
const MODEL_SPELLINGS: &[(&str, &str)] = &[("crv", "cr-v"), ("f150", "f-150")];

const MAKE_REQUIRED_MODELS: &[&str] = &[
    "is",
    "es",
    "ls",
    "gs",
    "rs",
    "rc",
    "lc",
    "tt",
    "tl",
    "fit",
    "edge",
    "escape",
    "element",
    "insight",
    "passport",
    "pilot",
    "quest",
    "titan",
    "accent",
    "rio",
    "soul",
    "journey",
    "legend",
    "compass",
    "commander",
    "regal",
    "encore",
    "continental",
    "convertible",
    "hardtop",
    "cooper",
    "spider",
    "discovery",
    "defender",
    "ghost",
    "dawn",
    "phantom",
    "legacy",
    "ascent",
    "atlas",
    "golf",
    "roma",
    "neon",
    "200",
    "300",
    "500",
];

const TRIMS: &[&str] = &[
    "grand touring",
    "plug-in",
    "se",
    "ex",
    "ex-l",
    "lx",
    "le",
    "xle",
    "sport",
    "touring",
    "premium",
    "platinum",
    "limited",
    "elite",
    "advance",
    "reserve",
    "signature",
    "gt",
    "turbo",
    "hybrid",
    "ev",
    "electric",
    "phev",
];

const COLOR_SYNONYMS: &[(&str, &str)] = &[
    ("white", "white"),
    ("black", "black"),
    ("red", "red"),
    ("blue", "blue"),
    ("silver", "silver"),
    ("gray", "gray"),
    ("grey", "gray"),
    ("green", "green"),
    ("yellow", "yellow"),
    ("orange", "orange"),
    ("purple", "purple"),
    ("brown", "brown"),
    ("tan", "tan"),
    ("beige", "beige"),
    ("gold", "gold"),
    ("navy", "blue"),
    ("dark blue", "blue"),
    ("light blue", "blue"),
    ("dark red", "red"),
    ("maroon", "red"),
    ("burgundy", "red"),
    ("dark green", "green"),
    ("light green", "green"),
    ("dark gray", "gray"),
    ("light gray", "gray"),
    ("charcoal", "gray"),
];

const BODY_TYPE_SYNONYMS: &[(&str, &str)] = &[
    ("sedan", "sedan"),
    ("suv", "suv"),
    ("crossover", "suv"),
    ("truck", "truck"),
    ("pickup", "truck"),
    ("pick-up", "truck"),
    ("hatchback", "hatchback"),
    ("wagon", "wagon"),
    ("convertible", "convertible"),
    ("coupe", "coupe"),
    ("minivan", "minivan"),
    ("van", "minivan"),
    ("compact", "sedan"),
    ("midsize", "sedan"),
    ("fullsize", "sedan"),
];

/// One pattern per feature family; the matched text is recorded.
const FEATURE_PATTERNS: &[&str] = &[
    r"\b(3rd row|third row|third-row)\b",
    r"\b(hybrid|electric|ev|phev|plug-in)\b",
    r"\b(awd|4wd|all wheel drive|all-wheel drive|four wheel drive)\b",
    r"\b(leather|heated seats|ventilated seats|cooled seats)\b",
    r"\b(navigation|nav|gps)\b",
    r"\b(sunroof|moonroof|panoramic)\b",
    r"\b(backup camera|rear camera|360 camera)\b",
    r"\b(blind spot monitoring|blind spot|bsm)\b",
    r"\b(lane departure|lane keeping|lane assist)\b",
    r"\b(adaptive cruise|radar cruise|smart cruise)\b",
    r"\b(apple carplay|android auto|carplay)\b",
    r"\b(bluetooth audio|bluetooth)\b",
    r"\b(premium audio|bose|harman kardon|jbl)\b",
    r"\b(remote start|push button start|keyless)\b",
    r"\b(automatic|manual|cvt)\b",
];

// ============ Compiled matchers ============

struct Term {
    re: Regex,
    text: &'static str,
    canonical: &'static str,
}

fn compile_terms(pairs: &[(&'static str, &'static str)]) -> Vec<Term> {
    let mut sorted: Vec<_> = pairs.to_vec();
    // Longest first; stable so table order breaks ties
    sorted.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    sorted
        .into_iter()
        .map(|(text, canonical)| Term {
            re: Regex::new(&format!(r"\b{}\b", regex::escape(text))).unwrap(),
            text,
            canonical,
        })
        .collect()
}

static MAKES: LazyLock<Vec<Term>> = LazyLock::new(|| compile_terms(MAKE_SYNONYMS));
static MODEL_TERMS: LazyLock<Vec<Term>> = LazyLock::new(|| compile_terms(MODELS));
static COLORS: LazyLock<Vec<Term>> = LazyLock::new(|| compile_terms(COLOR_SYNONYMS));
static BODY_TYPES: LazyLock<Vec<Term>> = LazyLock::new(|| compile_terms(BODY_TYPE_SYNONYMS));
static TRIM_TERMS: LazyLock<Vec<Term>> = LazyLock::new(|| {
    let pairs: Vec<(&'static str, &'static str)> = TRIMS.iter().map(|t| (*t, *t)).collect();
    compile_terms(&pairs)
});
static FEATURES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    FEATURE_PATTERNS
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

static YEAR_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20[0-3]\d)\s*(?:-|–|—|to|through)\s*(20[0-3]\d)\b").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(20[0-3]\d)\b").unwrap());
static BUDGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:under|below|less than|no more than|up to|max(?:imum)?|around|about|budget(?: is| of)?)\s*\$?\s*(\d+(?:,\d{3})*(?:\.\d+)?)\s*(k|thousand)?\b",
    )
    .unwrap()
});

/// Find the first term matching `text`, with an optional extra guard.
fn first_match<'a>(
    terms: &'a [Term],
    text: &str,
    mut accept: impl FnMut(&Term, usize, usize) -> bool,
) -> Option<&'a Term> {
    terms.iter().find(|term| {
        term.re
            .find_iter(text)
            .any(|m| accept(term, m.start(), m.end()))
    })
}

/// Numeric terms inside a price (`$32,500`, `500k`) are not model names.
fn is_part_of_number(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    matches!(before, Some('$' | ',' | '.'))
        || matches!(after, Some(',' | 'k'))
        || matches!(after, Some('.')) && text[end..].chars().nth(1).is_some_and(|c| c.is_ascii_digit())
}

// ============ Parser ============

/// Keyword/regex entity parser. Stateless; vocabularies are compiled once.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityParser;

impl EntityParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a customer message into a [`VehicleQuery`].
    pub fn parse(&self, message: &str) -> VehicleQuery {
        let text = message.trim().to_lowercase();
        if text.is_empty() {
            return VehicleQuery::default();
        }

        let (make, model) = extract_make_model(&text);
        let (year_min, year_max) = extract_years(&text);

        VehicleQuery {
            make,
            model,
            trim: extract_trim(&text),
            year_min,
            year_max,
            color: first_match(&COLORS, &text, |_, _, _| true).map(|t| t.canonical.to_string()),
            budget_max: extract_budget(&text),
            body_type: extract_body_type(&text),
            features: extract_features(&text),
        }
    }
}

/// Convenience wrapper around [`EntityParser::parse`].
pub fn parse_message(message: &str) -> VehicleQuery {
    EntityParser::new().parse(message)
}

fn extract_make_model(text: &str) -> (Option<String>, Option<String>) {
    let named_make = first_match(&MAKES, text, |_, _, _| true).map(|t| t.canonical);

    let model = first_match(&MODEL_TERMS, text, |term, start, end| {
        if term.text.chars().all(|c| c.is_ascii_digit()) && is_part_of_number(text, start, end) {
            return false;
        }
        if MAKE_REQUIRED_MODELS.contains(&term.text) {
            return named_make == Some(term.canonical);
        }
        true
    });

    let make = named_make.or(model.map(|m| m.canonical));
    let model = model.map(|m| canonical_model(m.text));
    (make.map(str::to_string), model.map(str::to_string))
}

fn canonical_model(text: &'static str) -> &'static str {
    MODEL_SPELLINGS
        .iter()
        .find(|(alias, _)| *alias == text)
        .map_or(text, |&(_, model)| model)
}

fn extract_trim(text: &str) -> Option<String> {
    first_match(&TRIM_TERMS, text, |_, _, _| true).map(|t| t.text.to_string())
}

fn extract_years(text: &str) -> (Option<i64>, Option<i64>) {
    if let Some(caps) = YEAR_RANGE_RE.captures(text) {
        let a: i64 = caps[1].parse().unwrap_or_default();
        let b: i64 = caps[2].parse().unwrap_or_default();
        return (Some(a.min(b)), Some(a.max(b)));
    }

    // A bare year inside a price ("$20,215") is not a model year
    YEAR_RE
        .find_iter(text)
        .find(|m| !is_part_of_number(text, m.start(), m.end()))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map_or((None, None), |year| (Some(year), Some(year)))
}

fn extract_budget(text: &str) -> Option<f64> {
    let caps = BUDGET_RE.captures(text)?;
    let amount: f64 = caps[1].replace(',', "").parse().ok()?;
    let amount = if caps.get(2).is_some() {
        amount * 1000.0
    } else {
        amount
    };
    (amount > 0.0).then_some(amount)
}

fn extract_body_type(text: &str) -> Option<String> {
    first_match(&BODY_TYPES, text, |_, _, _| true).map(|t| t.canonical.to_string())
}

fn extract_features(text: &str) -> Vec<String> {
    FEATURES
        .iter()
        .filter_map(|re| re.captures(text).map(|c| c[1].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_tiguan_under_32k() {
        let q = parse_message("Do you have a white Tiguan under 32k?");
        assert_eq!(q.make.as_deref(), Some("volkswagen"));
        assert_eq!(q.model.as_deref(), Some("tiguan"));
        assert_eq!(q.color.as_deref(), Some("white"));
        assert_eq!(q.budget_max, Some(32000.0));
        assert!(q.has_strong_signals());
    }

    #[test]
    fn test_year_range_and_trim() {
        let q = parse_message("Looking for a 2021-2023 Civic EX around 20k.");
        assert_eq!(q.make.as_deref(), Some("honda"));
        assert_eq!(q.model.as_deref(), Some("civic"));
        assert_eq!(q.trim.as_deref(), Some("ex"));
        assert_eq!(q.year_min, Some(2021));
        assert_eq!(q.year_max, Some(2023));
        assert_eq!(q.budget_max, Some(20000.0));
    }

    #[test]
    fn test_year_range_with_to() {
        let q = parse_message("any camry 2019 to 2017");
        assert_eq!(q.year_min, Some(2017));
        assert_eq!(q.year_max, Some(2019));
    }

    #[test]
    fn test_single_year_sets_both_bounds() {
        let q = parse_message("2020 accord please");
        assert_eq!(q.year_min, Some(2020));
        assert_eq!(q.year_max, Some(2020));
    }

    #[test]
    fn test_suv_third_row() {
        let q = parse_message("SUV with 3rd row this weekend.");
        assert_eq!(q.body_type.as_deref(), Some("suv"));
        assert_eq!(q.features, vec!["3rd row".to_string()]);
        assert!(q.make.is_none());
        assert!(q.has_strong_signals());
    }

    #[test]
    fn test_make_synonyms() {
        assert_eq!(parse_message("a used chevy").make.as_deref(), Some("chevrolet"));
        assert_eq!(parse_message("vw golf").make.as_deref(), Some("volkswagen"));
        assert_eq!(
            parse_message("something like a range rover").make.as_deref(),
            Some("land rover")
        );
        assert_eq!(parse_message("benz c-class").make.as_deref(), Some("mercedes-benz"));
    }

    #[test]
    fn test_explicit_make_not_overridden_by_model() {
        let q = parse_message("toyota or maybe a civic");
        assert_eq!(q.make.as_deref(), Some("toyota"));
        assert_eq!(q.model.as_deref(), Some("civic"));
    }

    #[test]
    fn test_word_boundaries_prevent_partial_matches() {
        let q = parse_message("porsche cayenne");
        assert_eq!(q.model.as_deref(), Some("cayenne"));
        // "red" inside "hundred" is not a color
        assert!(parse_message("two hundred miles").color.is_none());
    }

    #[test]
    fn test_common_word_models_need_their_make() {
        let q = parse_message("is it still available?");
        assert!(q.model.is_none());
        assert!(q.make.is_none());
        assert!(!q.has_strong_signals());

        let q = parse_message("do you have a lexus is");
        assert_eq!(q.make.as_deref(), Some("lexus"));
        assert_eq!(q.model.as_deref(), Some("is"));
    }

    #[test]
    fn test_model_spellings_normalized() {
        let q = parse_message("looking for a crv");
        assert_eq!(q.make.as_deref(), Some("honda"));
        assert_eq!(q.model.as_deref(), Some("cr-v"));

        let q = parse_message("need an F150 under 40k");
        assert_eq!(q.make.as_deref(), Some("ford"));
        assert_eq!(q.model.as_deref(), Some("f-150"));

        assert_eq!(parse_message("a cr-v").model.as_deref(), Some("cr-v"));
    }

    #[test]
    fn test_numeric_model_inside_price_ignored() {
        let q = parse_message("something under $32,500");
        assert!(q.model.is_none());
        assert_eq!(q.budget_max, Some(32500.0));
    }

    #[test]
    fn test_budget_variants() {
        assert_eq!(parse_message("less than $25,000").budget_max, Some(25000.0));
        assert_eq!(parse_message("budget is 18 thousand").budget_max, Some(18000.0));
        assert_eq!(parse_message("under 15000").budget_max, Some(15000.0));
        assert_eq!(parse_message("what do you have").budget_max, None);
    }

    #[test]
    fn test_color_synonyms_longest_first() {
        assert_eq!(parse_message("navy sedan").color.as_deref(), Some("blue"));
        assert_eq!(parse_message("dark gray truck").color.as_deref(), Some("gray"));
        assert_eq!(parse_message("grey one").color.as_deref(), Some("gray"));
    }

    #[test]
    fn test_body_type_synonyms() {
        assert_eq!(parse_message("a pickup").body_type.as_deref(), Some("truck"));
        assert_eq!(parse_message("crossover").body_type.as_deref(), Some("suv"));
        assert_eq!(parse_message("family minivan").body_type.as_deref(), Some("minivan"));
    }

    #[test]
    fn test_multiple_feature_families() {
        let q = parse_message("need awd, leather and apple carplay");
        assert_eq!(q.features, vec!["awd", "leather", "apple carplay"]);
    }

    #[test]
    fn test_hybrid_is_trim_and_feature_but_weak() {
        let q = parse_message("Any hybrids?");
        // "hybrids" is not the word "hybrid"
        assert!(q.trim.is_none());
        let q = parse_message("any hybrid?");
        assert_eq!(q.trim.as_deref(), Some("hybrid"));
        assert_eq!(q.features, vec!["hybrid"]);
        assert!(!q.has_strong_signals());
    }

    #[test]
    fn test_empty_message() {
        let q = parse_message("   ");
        assert!(q.is_empty());
        assert!(!q.has_strong_signals());
    }
}
