//! String lookup for user-visible text (channel names, station text,
//! error hints). Keys are the English strings; a missing translation
//! falls back to the key itself.

/// Station text templates. Placeholders are `{name}` and filled by [`fill`].
pub const STATION_V2_STREET: &str = "{address}, {city}<br/>Station founder: {founder}";
pub const STATION_V2_CITY: &str = "{city}<br/>Station founder: {founder}";
pub const STATION_V1_STREET: &str = "{vendor} - {address}, {locality}<br/>Station founder: {founder}";
pub const STATION_V1_LOCALITY: &str = "{vendor} - {locality}<br/>Station founder: {founder}";

pub const SENSOR_NOT_FOUND: &str = "Sensor id ({id}) not exists";
pub const API_KEY_HINT: &str = "Enter correct airly API key - get one on https://developer.airly.eu";

#[derive(Debug, Clone)]
pub struct Translator {
    language: String,
}

impl Translator {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.trim().to_ascii_lowercase(),
        }
    }

    /// Look up `key` for the active language.
    pub fn tr<'a>(&self, key: &'a str) -> &'a str {
        let translated = match self.language.as_str() {
            "pl" => polish(key),
            _ => None,
        };
        translated.unwrap_or(key)
    }
}

fn polish(key: &str) -> Option<&'static str> {
    let s = match key {
        "Air Quality Index" => "Jakość powietrza",
        "PM1" => "PM1",
        "PM2,5" => "PM2,5",
        "PM10" => "PM10",
        "PM2,5 Norm" => "PM2,5 Norma",
        "PM10 Norm" => "PM10 Norma",
        "Air pollution Level" => "Zanieczyszczenie powietrza",
        "Advice" => "Wskazówki",
        "Temperature" => "Temperatura",
        "Air pressure" => "Ciśnienie powietrza",
        "Humidity" => "Wilgotność",
        "Sensor information" => "Informacje o stacji",
        "Very low" => "Bardzo niski",
        "Low" => "Niski",
        "Medium" => "Średni",
        "High" => "Wysoki",
        "Extreme" => "Ekstremalny",
        "Airmageddon" => "Airmageddon",
        "Not authorized" => "Brak autoryzacji",
        "Starting device update" => "Rozpoczynanie aktualizacji urządzeń",
        "Next poll attempt at" => "Następna próba pobrania",
        "Connection to airly api failed" => "Połączenie z airly api nie powiodło się",
        "Unrecognized error" => "Nierozpoznany błąd",
        STATION_V2_STREET => "{address}, {city}<br/>Sponsor stacji: {founder}",
        STATION_V2_CITY => "{city}<br/>Sponsor stacji: {founder}",
        STATION_V1_STREET => "{vendor} - {address}, {locality}<br/>Sponsor stacji: {founder}",
        STATION_V1_LOCALITY => "{vendor} - {locality}<br/>Sponsor stacji: {founder}",
        SENSOR_NOT_FOUND => "Sensor ({id}) nie istnieje",
        API_KEY_HINT => "Wprowadź poprawny klucz api -  pobierz klucz na stronie https://developer.airly.eu",
        _ => return None,
    };
    Some(s)
}

/// Replace `{name}` placeholders in `template`.
pub fn fill(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in args {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}
