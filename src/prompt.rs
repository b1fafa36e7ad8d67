//! Extraction prompt rendering.
//!
//! All fuzzy matching of OCR noise is left to the model; this module only
//! renders a fixed template around the raw text, so the output is a pure
//! function of its input.

use crate::models::FIELD_KEYS;

// ── Constants ────────────────────────────────────────────────────────────────

/// Document labels (Italian and English, as printed on ID cards, passports
/// and driving licences) and the field each one feeds.
pub const LABEL_MAP: &[(&str, &str)] = &[
    ("NOME | NAME | GIVEN NAME | GIVEN_NAMES | PRENOME", "nome"),
    ("COGNOME | SURNAME | FAMILY NAME | LAST NAME", "cognome"),
    ("NATO IL | DATA DI NASCITA | DATE OF BIRTH | BIRTH DATE | DOB", "dataNascita"),
    ("LUOGO DI NASCITA | NATO A | PLACE OF BIRTH | BIRTHPLACE", "luogoNascita"),
    ("CODICE FISCALE | C.F. | FISCAL CODE | TAX CODE", "codiceFiscale"),
    ("N. DOCUMENTO | NUMERO | DOCUMENT NO | CARD NUMBER | PASSPORT NO", "numeroDocumento"),
    ("DATA DI RILASCIO | RILASCIATO IL | EMISSIONE | DATE OF ISSUE | ISSUED", "dataRilascio"),
    ("SCADENZA | VALIDA FINO AL | DATE OF EXPIRY | EXPIRY | EXPIRES", "dataScadenza"),
];

/// Ordered rules for tokens that carry no label.
const DISAMBIGUATION_RULES: &[&str] = &[
    "Una parola isolata in maiuscolo che sembra un nome proprio è candidata per \"nome\" o \"cognome\"; se ce ne sono due consecutive, la prima è di solito il cognome.",
    "Un token nella forma DD/MM/YYYY o DD-MM-YYYY è candidato per un campo data: la data più vecchia è la nascita, tra le altre la più vecchia è il rilascio e la più recente la scadenza.",
    "Una sequenza di 16 caratteri alfanumerici è il codice fiscale.",
    "Un token nella forma di due lettere seguite da almeno sei cifre (es. CA1234567) è il numero del documento.",
];

// ── Public API ───────────────────────────────────────────────────────────────

/// Render the extraction prompt for `ocr_text`. The text is embedded
/// verbatim.
pub fn build_prompt(ocr_text: &str) -> String {
    let mut prompt = String::with_capacity(ocr_text.len() + 2048);

    prompt.push_str(
        "Analizza questo testo estratto tramite OCR da un documento di identità italiano \
         (carta d'identità, patente o passaporto) e restituisci SOLO un oggetto JSON valido \
         con questi campi:\n\n",
    );
    prompt.push_str(&schema_block());

    prompt.push_str("\n\nTesto da analizzare:\n");
    prompt.push_str(ocr_text);

    prompt.push_str("\n\nCorrispondenza etichette → campi:\n");
    for (labels, field) in LABEL_MAP {
        prompt.push_str(&format!("- {} → {}\n", labels, field));
    }

    prompt.push_str("\nTesto senza etichette, nell'ordine:\n");
    for (idx, rule) in DISAMBIGUATION_RULES.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", idx + 1, rule));
    }

    prompt.push_str(
        "\nRegole:\n\
         - Se un campo non è presente, lascialo vuoto \"\"\n\
         - Non inventare valori che non compaiono nel testo\n\
         - Le date in formato DD/MM/YYYY o DD-MM-YYYY\n\
         - Il codice fiscale deve essere di 16 caratteri\n\
         - Rispondi SOLO con il JSON, senza spiegazioni\n\
         \nJSON:",
    );

    prompt
}

fn schema_block() -> String {
    let body = FIELD_KEYS
        .iter()
        .map(|key| format!("    \"{}\": \"\"", key))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("{{\n{}\n}}", body)
}
