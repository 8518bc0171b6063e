use invoice_analytics::*;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

const DISTRIBUTOR_EXPORT: &str = "\
Nº;Data Emissão;Razão Social/Nome;Produto;Segmento;CFOP;Valor NF
1001;03/01/2023;Mercado Central;Arroz 5kg;Varejo;5102;1.200,00
1002;15/01/2023;Padaria Sol;Farinha 25kg;Food Service;5102;450,50
1003;02/02/2023;Mercado Central;Feijão 1kg;Varejo;5102;980,00
1003;02/02/2023;Mercado Central;Arroz 5kg;Varejo;5102;320,00
1004;20/02/2023;Restaurante Mar;Óleo 900ml;Food Service;5405;210,00
1005;05/03/2023;Mercado Central;Arroz 5kg;Varejo;5102;1.500,00
1006;18/03/2023;Padaria Sol;Farinha 25kg;Food Service;5102;600,00
1007;10/04/2023;Atacado Norte;Arroz 5kg;Atacado;6102;2.400,00
1008;;Padaria Sol;Farinha 25kg;Food Service;5102;99,50
1009;22/04/2023;;Feijão 1kg;Varejo;5102;abc
1010;03/01/2024;Mercado Central;Arroz 5kg;Varejo;5102;1.350,00
";

fn comma_config() -> AnalyticsConfig {
    AnalyticsConfig {
        decimal_separator: DecimalSeparator::Comma,
        ..AnalyticsConfig::default()
    }
}

fn distributor_raw() -> anyhow::Result<RawRecordSet> {
    Ok(RawRecordSet::from_csv_reader(
        DISTRIBUTOR_EXPORT.as_bytes(),
        b';',
    )?)
}

fn export_tables(report: &AnalyticsReport, name: &str) -> anyhow::Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("invoice-analytics-{}", name));
    std::fs::create_dir_all(&dir)?;

    for (idx, table) in report.tables().iter().enumerate() {
        let path = dir.join(format!("{:02}.csv", idx));
        let mut file = File::create(&path)?;
        file.write_all(table.to_csv()?.as_bytes())?;
    }

    let mut summary = File::create(dir.join("summary.md"))?;
    for table in report.tables() {
        writeln!(summary, "{}", table.to_markdown())?;
    }

    Ok(dir)
}

#[test]
fn test_distributor_export_end_to_end() -> anyhow::Result<()> {
    let raw = distributor_raw()?;
    let report = AnalyticsProcessor::process_with_verification(&comma_config(), &raw, 1e-6)?;

    for field in CanonicalField::ALL {
        if field != CanonicalField::TaxCst {
            assert!(report.field_map.is_mapped(field), "{} should be mapped", field);
        }
    }
    assert!(!report.field_map.is_mapped(CanonicalField::TaxCst));

    let kpis = &report.kpis;
    assert_eq!(kpis.record_count, 11);
    assert!((kpis.revenue - 9110.0).abs() < 1e-6);
    // Mercado Central, Padaria Sol, Restaurante Mar, Atacado Norte, UNKNOWN.
    assert_eq!(kpis.active_customers, 5);
    assert!((kpis.average_ticket - 9110.0 / 5.0).abs() < 1e-6);
    assert_eq!(kpis.months_covered, 5);
    assert_eq!(kpis.outside_timeline_records, 1);
    assert!((kpis.outside_timeline_amount - 99.5).abs() < 1e-9);
    assert_eq!(kpis.concentration_risk, RiskTier::High);

    assert_eq!(report.normalization.unparseable_dates, 1);
    assert_eq!(report.normalization.coerced_amounts, 1);
    assert_eq!(report.normalization.missing_customers, 1);

    let top = &report.top_customers.entries[0];
    assert_eq!(top.key.to_string(), "MERCADO CENTRAL");
    assert!((top.value - 5350.0).abs() < 1e-6);

    let central = report
        .customer_matrix
        .iter()
        .find(|r| r.key.to_string() == "MERCADO CENTRAL")
        .unwrap();
    // Five lines, but document 1003 spans two of them.
    assert_eq!(central.frequency, 4);

    assert!(report.product_abc.is_some());
    assert!(report.segment_abc.is_some());
    assert_eq!(
        report.tax_cfop_revenue.as_ref().unwrap().entries[0].key.to_string(),
        "5102"
    );
    Ok(())
}

#[test]
fn test_monthly_series_and_projection() -> anyhow::Result<()> {
    let report = AnalyticsProcessor::process(&comma_config(), &distributor_raw()?)?;

    let labels: Vec<String> = report
        .monthly_revenue
        .entries
        .iter()
        .map(|e| e.key.to_string())
        .collect();
    assert_eq!(labels, vec!["2023-01", "2023-02", "2023-03", "2023-04", "2024-01"]);

    let projection = report.projection.projection().unwrap();
    assert_eq!(projection.horizon(), 12);
    assert_eq!(projection.anchor_period.to_string(), "2024-01");
    assert_eq!(projection.points[0].period.to_string(), "2024-02");
    assert_eq!(projection.statistics.rates.len(), 4);
    Ok(())
}

#[test]
fn test_seasonality_and_year_comparison() -> anyhow::Result<()> {
    let report = AnalyticsProcessor::process(&comma_config(), &distributor_raw()?)?;

    assert_eq!(report.seasonality.len(), 12);
    let january = &report.seasonality[0];
    assert!((january.value - (1200.0 + 450.5 + 1350.0)).abs() < 1e-6);
    assert_eq!(report.seasonality[11].value, 0.0);

    assert_eq!(report.year_comparison.len(), 24);
    let jan_2024 = report
        .year_comparison
        .iter()
        .find(|r| r.year == 2024 && r.month_of_year == 1)
        .unwrap();
    assert!((jan_2024.value - 1350.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_comma_decimals_under_dot_config_are_coerced() -> anyhow::Result<()> {
    let report = AnalyticsProcessor::process(&AnalyticsConfig::default(), &distributor_raw()?)?;

    assert_eq!(report.normalization.coerced_amounts, 11);
    assert_eq!(report.kpis.revenue, 0.0);
    assert_eq!(report.kpis.record_count, 11);
    Ok(())
}

#[test]
fn test_missing_amount_column_is_rejected() -> anyhow::Result<()> {
    let raw = RawRecordSet::from_csv_reader(
        "Data;Cliente;Produto\n01/01/2023;ACME;X\n".as_bytes(),
        b';',
    )?;
    let err = AnalyticsProcessor::process(&AnalyticsConfig::default(), &raw).unwrap_err();

    match err {
        AnalyticsError::SchemaValidation { missing, detected } => {
            assert_eq!(missing, vec![CanonicalField::Amount]);
            assert_eq!(detected, vec!["Data", "Cliente", "Produto"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn test_unparseable_amount_counts_as_zero() -> anyhow::Result<()> {
    let raw = RawRecordSet::from_csv_reader(
        "Data;Cliente;Total\n01/01/2023;ACME;abc\n02/01/2023;ACME;10\n".as_bytes(),
        b';',
    )?;
    let report = AnalyticsProcessor::process(&AnalyticsConfig::default(), &raw)?;

    assert_eq!(report.kpis.revenue, 10.0);
    assert_eq!(report.kpis.record_count, 2);
    assert_eq!(report.customer_matrix[0].frequency, 2);
    Ok(())
}

#[test]
fn test_single_month_projection_is_insufficient() -> anyhow::Result<()> {
    let raw = RawRecordSet::from_csv_reader(
        "Data;Cliente;Total\n01/01/2023;ACME;100\n15/01/2023;Beta;50\n".as_bytes(),
        b';',
    )?;
    let report = AnalyticsProcessor::process(&AnalyticsConfig::default(), &raw)?;

    assert_eq!(
        report.projection,
        ProjectionOutcome::InsufficientData {
            observed_points: 1,
            usable_rates: 0
        }
    );
    let projection_table = report.tables().pop().unwrap();
    assert_eq!(projection_table.title, "Projection");
    assert!(projection_table.is_empty());
    Ok(())
}

#[test]
fn test_steady_growth_projection_from_records() -> anyhow::Result<()> {
    let raw = RawRecordSet::from_columns(vec![
        (
            "date".to_string(),
            vec!["2023-01-10".into(), "2023-02-10".into(), "2023-03-10".into()],
        ),
        (
            "customer".to_string(),
            vec!["ACME".into(), "ACME".into(), "ACME".into()],
        ),
        ("amount".to_string(), vec![100.0.into(), 110.0.into(), 121.0.into()]),
    ])?;
    let mut config = AnalyticsConfig::default();
    config.projection.horizon = 2;

    let report = AnalyticsProcessor::process(&config, &raw)?;
    let projection = report.projection.projection().unwrap();
    for scenario in Scenario::ALL {
        let values = projection.scenario_values(scenario);
        assert!((values[0] - 133.1).abs() < 1e-6);
        assert!((values[1] - 146.41).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn test_product_abc_only_when_mapped() -> anyhow::Result<()> {
    let raw = RawRecordSet::from_csv_reader(
        "Data;Cliente;Total\n01/01/2023;ACME;100\n".as_bytes(),
        b';',
    )?;
    let report = AnalyticsProcessor::process(&AnalyticsConfig::default(), &raw)?;
    assert!(report.product_abc.is_none());
    assert!(report.segment_abc.is_none());
    assert!(!report.tables().iter().any(|t| t.title == "Product ABC"));
    Ok(())
}

#[test]
fn test_filtered_processing() -> anyhow::Result<()> {
    let filter = RecordFilter {
        years: Some([2023].into_iter().collect()),
        months: Some([1, 2].into_iter().collect()),
    };
    let report =
        AnalyticsProcessor::process_filtered(&comma_config(), &distributor_raw()?, &filter)?;

    assert!((report.kpis.revenue - (1200.0 + 450.5 + 980.0 + 320.0 + 210.0)).abs() < 1e-6);
    assert_eq!(report.kpis.outside_timeline_records, 0);
    assert_eq!(report.monthly_revenue.len(), 2);
    assert_eq!(report.normalization.total_rows, 5);
    assert_eq!(report.normalization.coerced_amounts, 0);
    let verification = verify_report(&report, 1e-6)?;
    assert!(verification.warnings.is_empty());
    Ok(())
}

#[test]
fn test_outputs_are_deterministic() -> anyhow::Result<()> {
    let first = AnalyticsProcessor::process(&comma_config(), &distributor_raw()?)?;
    let second = AnalyticsProcessor::process(&comma_config(), &distributor_raw()?)?;

    assert_eq!(serde_json::to_string(&first)?, serde_json::to_string(&second)?);

    let first_tables: Vec<String> = first.tables().iter().map(Table::to_markdown).collect();
    let second_tables: Vec<String> = second.tables().iter().map(Table::to_markdown).collect();
    assert_eq!(first_tables, second_tables);
    Ok(())
}

#[test]
fn test_report_round_trips_through_json() -> anyhow::Result<()> {
    let report = AnalyticsProcessor::process(&comma_config(), &distributor_raw()?)?;
    let json = serde_json::to_string_pretty(&report)?;
    let parsed: AnalyticsReport = serde_json::from_str(&json)?;
    assert_eq!(parsed.kpis, report.kpis);
    assert_eq!(parsed.monthly_revenue, report.monthly_revenue);
    assert_eq!(parsed.customer_abc.rows.len(), report.customer_abc.rows.len());
    Ok(())
}

#[test]
fn test_export_tables_to_files() -> anyhow::Result<()> {
    let report = AnalyticsProcessor::process(&comma_config(), &distributor_raw()?)?;
    let dir = export_tables(&report, "distributor")?;

    let field_map = std::fs::read_to_string(dir.join("00.csv"))?;
    assert!(field_map.starts_with("field,status,source_column"));
    assert!(field_map.contains("customer,mapped,Razão Social/Nome"));

    let summary = std::fs::read_to_string(dir.join("summary.md"))?;
    assert!(summary.contains("## Customer ABC"));
    Ok(())
}

#[test]
fn test_strict_customer_mode() -> anyhow::Result<()> {
    let config = AnalyticsConfig {
        strict_customer: true,
        ..comma_config()
    };
    let report = AnalyticsProcessor::process_with_verification(&config, &distributor_raw()?, 1e-6)?;

    assert_eq!(report.kpis.active_customers, 4);
    assert!(!report
        .top_customers
        .entries
        .iter()
        .any(|e| e.key.to_string() == UNKNOWN_CUSTOMER));
    Ok(())
}

#[test]
fn test_schema_generation() {
    let schema_json = AnalyticsConfig::schema_as_json().unwrap();
    assert!(schema_json.contains("decimal_separator"));
    assert!(schema_json.contains("risk_thresholds"));
    assert!(schema_json.contains("planned_growth"));
}

#[test]
fn test_config_from_path() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join("invoice-analytics-config.json");
    std::fs::write(
        &path,
        r#"{ "decimal_separator": "comma", "concentration_top_n": 3, "abc_thresholds": { "a_upper": 0.7 } }"#,
    )?;
    let config = AnalyticsConfig::from_path(&path)?;
    assert_eq!(config.decimal_separator, DecimalSeparator::Comma);
    assert_eq!(config.concentration_top_n, 3);
    assert_eq!(config.abc_thresholds.a_upper, 0.7);
    assert_eq!(config.abc_thresholds.b_upper, 0.95);
    Ok(())
}
