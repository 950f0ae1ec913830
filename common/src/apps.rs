use crate::kv::KeyValue;

/// Funciones de aplicación que corren los workers.
pub trait MapReduceApp: Send + Sync {
    /// `file` es el nombre del archivo de entrada y `contents` su contenido completo.
    fn map(&self, file: &str, contents: &str) -> Vec<KeyValue>;

    /// Se llama una vez por clave distinta, con todos sus valores.
    fn reduce(&self, key: &str, values: &[String]) -> String;
}

/// WordCount: cuenta apariciones de cada palabra.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCount;

/// Palabras normalizadas: sólo alfanumérico y '_', en minúscula.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().filter_map(|raw| {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_lowercase();

        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    })
}

impl MapReduceApp for WordCount {
    fn map(&self, _file: &str, contents: &str) -> Vec<KeyValue> {
        tokenize(contents).map(|w| KeyValue::new(w, "1")).collect()
    }

    fn reduce(&self, _key: &str, values: &[String]) -> String {
        let total: u64 = values
            .iter()
            .map(|v| v.trim().parse::<u64>().unwrap_or(0))
            .sum();
        total.to_string()
    }
}

/// Busca una aplicación por nombre (lo que reciben worker y client en `MR_APP` / `--app`).
pub fn app_by_name(name: &str) -> Option<Box<dyn MapReduceApp>> {
    match name {
        "wc" | "wordcount" => Some(Box::new(WordCount)),
        _ => None,
    }
}
