use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicU64, Ordering},
};
use thiserror::Error;

/// Par clave/valor que producen los map y consumen los reduce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("no se pudo abrir {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("registro corrupto en {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("error de E/S en {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Lee todos los registros de un archivo.
///
/// El formato es una secuencia de objetos JSON (uno por línea al escribir,
/// pero cualquier separación con espacios vale). No hay contador ni prefijo
/// de longitud: el fin de archivo limpio marca el final.
pub fn read_kvs(path: &Path) -> Result<Vec<KeyValue>, CodecError> {
    let file = File::open(path).map_err(|source| CodecError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let stream = serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<KeyValue>();

    let mut out = Vec::new();
    for item in stream {
        let kv = item.map_err(|source| {
            if source.is_io() {
                CodecError::Io {
                    path: path.to_path_buf(),
                    source: source.into(),
                }
            } else {
                CodecError::Decode {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        out.push(kv);
    }

    Ok(out)
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Archivo temporal al lado de un destino: `<destino>.tmp-<pid>-<n>`.
///
/// El nombre es único por proceso y por escritor, así dos intentos del mismo
/// task (o un worker viejo que sigue corriendo) no comparten temporal.
/// Si se suelta sin `persist()`, el temporal se borra.
pub(crate) struct TmpFile {
    path: PathBuf,
    persisted: bool,
}

impl TmpFile {
    pub(crate) fn for_target(target: &Path) -> Self {
        let n = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut tmp = target.as_os_str().to_owned();
        tmp.push(format!(".tmp-{}-{}", process::id(), n));
        Self {
            path: PathBuf::from(tmp),
            persisted: false,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Renombra al destino. Si el rename falla, el temporal se borra igual.
    pub(crate) fn persist(mut self, target: &Path) -> io::Result<()> {
        fs::rename(&self.path, target)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TmpFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Escritor secuencial de registros.
///
/// Escribe en un temporal propio y sólo renombra al destino en `finish()`,
/// así un proceso que muere a mitad no deja un archivo parcial con el nombre bueno.
/// Un escritor que se suelta sin `finish()` borra su temporal.
pub struct KvWriter {
    // se cierra antes de que `tmp` borre el archivo
    writer: BufWriter<File>,
    tmp: TmpFile,
    final_path: PathBuf,
    written: usize,
}

impl KvWriter {
    pub fn create(path: &Path) -> Result<Self, CodecError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| CodecError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let tmp = TmpFile::for_target(path);
        let file = File::create(tmp.path()).map_err(|source| CodecError::Open {
            path: tmp.path().to_path_buf(),
            source,
        })?;

        Ok(Self {
            writer: BufWriter::new(file),
            tmp,
            final_path: path.to_path_buf(),
            written: 0,
        })
    }

    pub fn write(&mut self, kv: &KeyValue) -> Result<(), CodecError> {
        let tmp_path = self.tmp.path();
        let io_err = |source: io::Error| CodecError::Io {
            path: tmp_path.to_path_buf(),
            source,
        };

        serde_json::to_writer(&mut self.writer, kv).map_err(|e| io_err(e.into()))?;
        self.writer.write_all(b"\n").map_err(io_err)?;
        self.written += 1;
        Ok(())
    }

    /// Hace flush, cierra y mueve el archivo a su nombre definitivo.
    /// Devuelve cuántos registros se escribieron.
    pub fn finish(self) -> Result<usize, CodecError> {
        let KvWriter {
            writer,
            tmp,
            final_path,
            written,
        } = self;

        let file = writer.into_inner().map_err(|e| CodecError::Io {
            path: tmp.path().to_path_buf(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(|source| CodecError::Io {
            path: tmp.path().to_path_buf(),
            source,
        })?;
        drop(file);

        tmp.persist(&final_path).map_err(|source| CodecError::Io {
            path: final_path.clone(),
            source,
        })?;

        Ok(written)
    }
}

/// Atajo: escribe todos los registros de una vez.
pub fn write_kvs<'a, I>(path: &Path, kvs: I) -> Result<usize, CodecError>
where
    I: IntoIterator<Item = &'a KeyValue>,
{
    let mut writer = KvWriter::create(path)?;
    for kv in kvs {
        writer.write(kv)?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs, path::PathBuf};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("kv_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn escribe_un_objeto_por_linea_y_lo_relee() {
        let tmp = temp_dir("lineas");
        let path = tmp.join("part");

        let kvs = vec![KeyValue::new("a", "1"), KeyValue::new("b", "con\nsalto")];
        assert_eq!(write_kvs(&path, &kvs).unwrap(), 2);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(entries(&tmp), vec!["part".to_string()]);

        assert_eq!(read_kvs(&path).unwrap(), kvs);
    }

    #[test]
    fn archivo_vacio_no_tiene_registros() {
        let tmp = temp_dir("vacio");
        let path = tmp.join("empty");
        fs::write(&path, "").unwrap();

        assert!(read_kvs(&path).unwrap().is_empty());
    }

    #[test]
    fn acepta_objetos_separados_por_espacios() {
        let tmp = temp_dir("espacios");
        let path = tmp.join("loose");
        fs::write(
            &path,
            "{\"key\":\"x\",\"value\":\"1\"}  {\"key\":\"y\",\"value\":\"2\"}\n\n",
        )
        .unwrap();

        let kvs = read_kvs(&path).unwrap();
        assert_eq!(kvs, vec![KeyValue::new("x", "1"), KeyValue::new("y", "2")]);
    }

    #[test]
    fn registro_truncado_es_error_de_decodificacion() {
        let tmp = temp_dir("truncado");
        let path = tmp.join("bad");
        fs::write(&path, "{\"key\":\"x\",\"value\":\"1\"}\n{\"key\":\"y\",\"va").unwrap();

        let err = read_kvs(&path).unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }), "got {err:?}");
    }

    #[test]
    fn archivo_inexistente_es_error_de_apertura() {
        let tmp = temp_dir("falta");
        let err = read_kvs(&tmp.join("nope")).unwrap_err();
        assert!(matches!(err, CodecError::Open { .. }));
    }

    #[test]
    fn dos_escritores_al_mismo_destino_no_se_pisan() {
        let tmp = temp_dir("mismo_destino");
        let path = tmp.join("mrtmp.job-0-0");

        // un reintento arranca mientras el intento viejo sigue escribiendo
        let mut viejo = KvWriter::create(&path).unwrap();
        let mut nuevo = KvWriter::create(&path).unwrap();
        viejo.write(&KeyValue::new("a", "viejo")).unwrap();
        nuevo.write(&KeyValue::new("a", "nuevo")).unwrap();

        assert_eq!(nuevo.finish().unwrap(), 1);
        assert_eq!(viejo.finish().unwrap(), 1);

        let kvs = read_kvs(&path).unwrap();
        assert_eq!(kvs.len(), 1);
        assert_eq!(kvs[0].key, "a");
        assert_eq!(entries(&tmp), vec!["mrtmp.job-0-0".to_string()]);
    }

    #[test]
    fn escritor_abandonado_borra_su_temporal() {
        let tmp = temp_dir("abandonado");
        let path = tmp.join("part");

        let mut writer = KvWriter::create(&path).unwrap();
        writer.write(&KeyValue::new("a", "1")).unwrap();
        assert_eq!(entries(&tmp).len(), 1);
        drop(writer);

        assert!(entries(&tmp).is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn rename_fallido_borra_el_temporal() {
        let tmp = temp_dir("rename_fallido");
        // el destino es un directorio no vacío: el rename no puede pisarlo
        let path = tmp.join("ocupado");
        fs::create_dir_all(path.join("adentro")).unwrap();

        let mut writer = KvWriter::create(&path).unwrap();
        writer.write(&KeyValue::new("a", "1")).unwrap();
        let err = writer.finish().unwrap_err();

        assert!(matches!(err, CodecError::Io { .. }));
        assert_eq!(entries(&tmp), vec!["ocupado".to_string()]);
    }
}
