//! Nombres deterministas de los archivos de un job.
//! Map workers, reduce workers y el merge final los calculan por su cuenta,
//! sin coordinarse, así que no pueden depender de nada más que sus argumentos.

/// Archivo intermedio que el map `map_task` produce para el reduce `reduce_task`.
pub fn reduce_name(job_name: &str, map_task: usize, reduce_task: usize) -> String {
    format!("mrtmp.{}-{}-{}", job_name, map_task, reduce_task)
}

/// Salida del reduce `reduce_task`.
pub fn merge_name(job_name: &str, reduce_task: usize) -> String {
    format!("mrtmp.{}-res-{}", job_name, reduce_task)
}

/// Resultado final del job, una vez juntadas todas las salidas de reduce.
pub fn answer_name(job_name: &str) -> String {
    format!("mrtmp.{}", job_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn reduce_name_es_pura() {
        assert_eq!(reduce_name("wc", 3, 1), reduce_name("wc", 3, 1));
        assert_eq!(reduce_name("wc", 3, 1), "mrtmp.wc-3-1");
    }

    #[test]
    fn reduce_name_distingue_cada_par() {
        let mut seen = HashSet::new();
        for m in 0..12 {
            for r in 0..12 {
                assert!(seen.insert(reduce_name("job", m, r)), "colisión en ({m}, {r})");
            }
        }
    }

    #[test]
    fn salidas_no_chocan_con_intermedios() {
        assert_eq!(merge_name("wc", 0), "mrtmp.wc-res-0");
        assert_ne!(merge_name("wc", 0), reduce_name("wc", 0, 0));
        assert_eq!(answer_name("wc"), "mrtmp.wc");
    }
}
