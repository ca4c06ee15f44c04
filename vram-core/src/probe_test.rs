#[cfg(test)]
mod tests {
    use crate::error::ProbeError;
    use crate::probe::{
        parse_memory_totals, probe_or_default, CapacityProbe, NvidiaSmiProbe, StaticProbe,
    };

    #[test]
    fn test_parse_sums_every_gpu() {
        assert_eq!(parse_memory_totals("24564\n24564\n").unwrap(), 49128);
        assert_eq!(parse_memory_totals("  81920 MiB \n").unwrap(), 81920);
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!(matches!(parse_memory_totals(""), Err(ProbeError::Empty)));
        assert!(matches!(parse_memory_totals("\n \n"), Err(ProbeError::Empty)));
        assert!(matches!(
            parse_memory_totals("[N/A]"),
            Err(ProbeError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_binary_falls_back() {
        let probe = NvidiaSmiProbe::with_binary("/nonexistent/nvidia-smi-for-tests");
        assert!(matches!(probe.probe(), Err(ProbeError::Unavailable(_))));
        assert_eq!(probe_or_default(&probe, 24_576), 24_576);
    }

    #[test]
    fn test_static_probe() {
        assert_eq!(probe_or_default(&StaticProbe(64), 1), 64);
        assert_eq!(probe_or_default(&StaticProbe(0), 7), 7);
    }
}
