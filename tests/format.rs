mod support;

use serde_json::json;

use gdc_frequent_mutations::format::{GeneTotals, format_mutation, round2};

use support::{ssm, symbol};

const TOTALS: GeneTotals = GeneTotals {
    cohort_cases: 300,
    portal_cases: 3000,
};

#[test]
fn formats_a_full_record() {
    let hit = ssm(json!({
        "ssm_id": "84aef48f-31e6-52e4-8e05-7d5b9ab15087",
        "genomic_dna_change": "chr7:g.140753336A>T",
        "mutation_subtype": "Single base substitution",
        "consequence": [
            {
                "transcript": {
                    "aa_change": "p.V600E",
                    "consequence_type": "missense_variant",
                    "annotation": {
                        "vep_impact": "MODERATE",
                        "sift_impact": "deleterious",
                        "sift_score": 0,
                        "polyphen_impact": "probably_damaging",
                        "polyphen_score": 0.967
                    }
                }
            },
            { "transcript": { "aa_change": "p.V640E" } }
        ]
    }));

    let row = format_mutation(&hit, &symbol("BRAF"), 57, TOTALS, 812);
    assert_eq!(row.ssm_id, "84aef48f-31e6-52e4-8e05-7d5b9ab15087");
    assert_eq!(row.gene, "BRAF");
    assert_eq!(row.dna_change, "chr7:g.140753336A>T");
    assert_eq!(row.protein_change, "BRAF p.V600E");
    assert_eq!(row.mutation_type, "Single base substitution");
    assert_eq!(row.consequence, "missense_variant");
    assert_eq!(row.num_cohort_ssm_affected_cases, 57);
    assert_eq!(row.num_cohort_ssm_cases, 300);
    assert_eq!(row.cohort_ssm_affected_cases_percentage, 19.0);
    assert_eq!(row.num_gdc_ssm_affected_cases, 812);
    assert_eq!(row.num_gdc_ssm_cases, 3000);
    assert_eq!(row.gdc_ssm_affected_cases_percentage, 27.07);
    assert_eq!(row.vep_impact, "MODERATE");
    assert_eq!(row.sift_impact, "deleterious");
    assert_eq!(row.sift_score, "0");
    assert_eq!(row.polyphen_impact, "probably_damaging");
    assert_eq!(row.polyphen_score, "0.967");
}

#[test]
fn empty_amino_acid_change_leaves_protein_change_empty() {
    let hit = ssm(json!({
        "ssm_id": "s1",
        "consequence": [{ "transcript": { "aa_change": "", "consequence_type": "intron_variant" } }]
    }));
    let row = format_mutation(&hit, &symbol("TP53"), 1, TOTALS, 1);
    assert_eq!(row.protein_change, "");
    assert_eq!(row.consequence, "intron_variant");
}

#[test]
fn missing_transcript_yields_empty_fields() {
    let hit = ssm(json!({ "ssm_id": "s2", "consequence": [] }));
    let row = format_mutation(&hit, &symbol("TP53"), 0, GeneTotals { cohort_cases: 0, portal_cases: 0 }, 0);
    assert_eq!(row.protein_change, "");
    assert_eq!(row.consequence, "");
    assert_eq!(row.vep_impact, "");
    assert_eq!(row.polyphen_score, "");
    assert_eq!(row.dna_change, "");
    assert_eq!(row.cohort_ssm_affected_cases_percentage, 0.0);
    assert_eq!(row.gdc_ssm_affected_cases_percentage, 0.0);
}

#[test]
fn null_annotation_values_are_empty() {
    let hit = ssm(json!({
        "ssm_id": "s3",
        "consequence": [{ "transcript": { "annotation": { "sift_score": null, "vep_impact": "HIGH" } } }]
    }));
    let row = format_mutation(&hit, &symbol("KRAS"), 1, TOTALS, 1);
    assert_eq!(row.sift_score, "");
    assert_eq!(row.vep_impact, "HIGH");
}

#[test]
fn percentages_round_to_two_places() {
    assert_eq!(round2(100.0 / 3.0), 33.33);
    assert_eq!(round2(2.0 / 3.0 * 100.0), 66.67);
    assert_eq!(round2(12.5), 12.5);
}
