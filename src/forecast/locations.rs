//! Hobli registry and location-to-model resolution
//!
//! Models are trained per hobli and stored under a slug of the form
//! `<hobli>_<taluk>`. Requests carry a free-form location name plus
//! coordinates, so resolution walks from the most to the least specific match.

use serde::Serialize;

use super::ForecastError;

/// A registered hobli
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Hobli {
    pub name: &'static str,
    pub taluk: &'static str,
    pub hobli: &'static str,
    pub lat: f64,
    pub lon: f64,
    pub slug: &'static str,
}

const fn hobli(
    name: &'static str,
    taluk: &'static str,
    hobli: &'static str,
    lat: f64,
    lon: f64,
    slug: &'static str,
) -> Hobli {
    Hobli { name, taluk, hobli, lat, lon, slug }
}

/// Bangalore Rural hoblis across four taluks
pub const HOBLIS: [Hobli; 21] = [
    // Doddaballapura
    hobli("Kasaba, Doddaballapura", "Doddaballapura", "Kasaba", 13.29273, 77.53891, "kasaba_doddaballapura"),
    hobli("Doddabelavangala, Doddaballapura", "Doddaballapura", "Doddabelavangala", 13.28855, 77.42205, "doddabelavangala_doddaballapura"),
    hobli("Thubagere, Doddaballapura", "Doddaballapura", "Thubagere", 13.373, 77.570, "thubagere_doddaballapura"),
    hobli("Sasalu, Doddaballapura", "Doddaballapura", "Sasalu", 13.280, 77.530, "sasalu_doddaballapura"),
    hobli("Madhure, Doddaballapura", "Doddaballapura", "Madhure", 13.19510, 77.45586, "madhure_doddaballapura"),
    // Devanahalli
    hobli("Kasaba, Devanahalli", "Devanahalli", "Kasaba", 13.18, 77.85, "kasaba_devanahalli"),
    hobli("Vijayapura, Devanahalli", "Devanahalli", "Vijayapura", 13.22, 77.88, "vijayapura_devanahalli"),
    hobli("Kundana, Devanahalli", "Devanahalli", "Kundana", 13.15, 77.92, "kundana_devanahalli"),
    hobli("Bettakote, Devanahalli", "Devanahalli", "Bettakote", 13.25, 77.80, "bettakote_devanahalli"),
    hobli("Undire, Devanahalli", "Devanahalli", "Undire", 13.12, 77.78, "undire_devanahalli"),
    // Hosakote
    hobli("Sulibele, Hosakote", "Hosakote", "Sulibele", 13.45, 77.77, "sulibele_hosakote"),
    hobli("Anugondanahalli, Hosakote", "Hosakote", "Anugondanahalli", 13.48, 77.82, "anugondanahalli_hosakote"),
    hobli("Jadigenahalli, Hosakote", "Hosakote", "Jadigenahalli", 13.50, 77.75, "jadigenahalli_hosakote"),
    hobli("Nandagudi, Hosakote", "Hosakote", "Nandagudi", 13.42, 77.70, "nandagudi_hosakote"),
    hobli("Kasaba, Hosakote", "Hosakote", "Kasaba", 13.47, 77.80, "kasaba_hosakote"),
    // Nelamangala
    hobli("Kasaba, Nelamangala", "Nelamangala", "Kasaba", 13.27, 77.45, "kasaba_nelamangala"),
    hobli("Huliyurdurga, Nelamangala", "Nelamangala", "Huliyurdurga", 13.30, 77.40, "huliyurdurga_nelamangala"),
    hobli("Tyamagondlu, Nelamangala", "Nelamangala", "Tyamagondlu", 13.25, 77.50, "tyamagondlu_nelamangala"),
    hobli("Sompura, Nelamangala", "Nelamangala", "Sompura", 13.32, 77.48, "sompura_nelamangala"),
    hobli("Lakshmipura, Nelamangala", "Nelamangala", "Lakshmipura", 13.28, 77.42, "lakshmipura_nelamangala"),
    hobli("Makali, Nelamangala", "Nelamangala", "Makali", 13.35, 77.52, "makali_nelamangala"),
];

/// Distinct taluks in registry order
pub fn taluks() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for h in HOBLIS.iter() {
        if !out.contains(&h.taluk) {
            out.push(h.taluk);
        }
    }
    out
}

/// Human-readable name for a model slug
pub fn display_name(slug: &str) -> String {
    if let Some(h) = HOBLIS.iter().find(|h| h.slug == slug) {
        return h.name.to_string();
    }

    slug.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a location name into slug form
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if (c == ' ' || c == '-' || c == '_') && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

/// Great-circle distance in kilometres
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Pick the model slug for a request.
///
/// `available` must be sorted; the final fallback takes its first entry.
pub fn resolve<'a>(
    name: &str,
    coords: Option<(f64, f64)>,
    available: &[&'a str],
) -> Result<&'a str, ForecastError> {
    if available.is_empty() {
        return Err(ForecastError::NoModels(name.to_string()));
    }

    let find = |slug: &str| available.iter().copied().find(|s| *s == slug);

    // Registry display name
    if let Some(h) = HOBLIS.iter().find(|h| h.name.eq_ignore_ascii_case(name.trim())) {
        if let Some(slug) = find(h.slug) {
            return Ok(slug);
        }
    }

    let slug = slugify(name);

    if !slug.is_empty() {
        if let Some(exact) = find(&slug) {
            return Ok(exact);
        }

        if let Some(partial) = available
            .iter()
            .copied()
            .find(|s| s.contains(slug.as_str()) || slug.contains(*s))
        {
            tracing::debug!("Location '{}' partially matched model {}", name, partial);
            return Ok(partial);
        }
    }

    if let Some((lat, lon)) = coords {
        let nearest = HOBLIS
            .iter()
            .filter_map(|h| find(h.slug).map(|s| (s, distance_km(lat, lon, h.lat, h.lon))))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((slug, km)) = nearest {
            tracing::info!(
                "Location '{}' not matched by name, using nearest model {} ({:.1} km)",
                name, slug, km
            );
            return Ok(slug);
        }
    }

    tracing::warn!("Location '{}' not found, using first available model", name);
    Ok(available[0])
}
