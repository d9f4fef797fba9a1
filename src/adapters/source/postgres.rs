//! PostgreSQL record source
//!
//! Thin read-only queries over a MIMIC-III shaped schema. Each call maps
//! rows straight into builder-boundary records; no translation or chunking
//! logic lives here.

use crate::adapters::source::RecordSource;
use crate::config::SourceConfig;
use crate::domain::records::{
    AdmissionRecord, CaregiverRecord, ChartEventRecord, DiagnosisRecord, LabEventRecord,
    PatientRecord, PrescriptionRecord, ProcedureRecord, TransferRecord, WardRecord,
};
use crate::domain::{MeridianError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use tokio_postgres::NoTls;

/// Record source over a MIMIC-III PostgreSQL database
pub struct PostgresSource {
    pool: Pool,
    schema: String,
}

impl PostgresSource {
    /// Creates a connection pool from the source configuration
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .dbname(&config.database)
            .user(&config.user)
            .password(config.password.expose_secret().as_ref());

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| MeridianError::Source(format!("Failed to build pool: {e}")))?;

        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MeridianError::Connection(format!("Failed to get connection: {e}")))
    }

    async fn load_admissions(
        &self,
        client: &deadpool_postgres::Object,
        subject_id: i32,
    ) -> Result<Vec<AdmissionRecord>> {
        let query = format!(
            "SELECT hadm_id, admission_type, admittime, dischtime \
             FROM {}.admissions WHERE subject_id = $1 ORDER BY admittime",
            self.schema
        );
        let rows = client.query(&query, &[&subject_id]).await?;

        let mut admissions = Vec::with_capacity(rows.len());
        for row in rows {
            let hadm_id: i32 = row.get("hadm_id");
            admissions.push(AdmissionRecord {
                admission_id: hadm_id.to_string(),
                admission_type: row.get("admission_type"),
                admit_time: to_utc(row.get("admittime")),
                discharge_time: to_utc(row.get("dischtime")),
                diagnoses: self.load_diagnoses(client, hadm_id).await?,
                procedures: self.load_procedures(client, hadm_id).await?,
                transfers: self.load_transfers(client, hadm_id).await?,
                prescriptions: self.load_prescriptions(client, hadm_id).await?,
                chart_events: self.load_chart_events(client, hadm_id).await?,
                lab_events: self.load_lab_events(client, hadm_id).await?,
            });
        }
        Ok(admissions)
    }

    async fn load_diagnoses(
        &self,
        client: &deadpool_postgres::Object,
        hadm_id: i32,
    ) -> Result<Vec<DiagnosisRecord>> {
        let query = format!(
            "SELECT d.icd9_code, i.long_title, d.seq_num \
             FROM {0}.diagnoses_icd d \
             LEFT JOIN {0}.d_icd_diagnoses i ON d.icd9_code = i.icd9_code \
             WHERE d.hadm_id = $1 ORDER BY d.seq_num",
            self.schema
        );
        let rows = client.query(&query, &[&hadm_id]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let icd_code: Option<String> = row.get("icd9_code");
                Some(DiagnosisRecord {
                    icd_code: icd_code?,
                    description: row.get("long_title"),
                    seq_number: row.get("seq_num"),
                })
            })
            .collect())
    }

    async fn load_procedures(
        &self,
        client: &deadpool_postgres::Object,
        hadm_id: i32,
    ) -> Result<Vec<ProcedureRecord>> {
        let query = format!(
            "SELECT p.icd9_code, i.long_title, p.seq_num \
             FROM {0}.procedures_icd p \
             LEFT JOIN {0}.d_icd_procedures i ON p.icd9_code = i.icd9_code \
             WHERE p.hadm_id = $1 ORDER BY p.seq_num",
            self.schema
        );
        let rows = client.query(&query, &[&hadm_id]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let icd_code: Option<String> = row.get("icd9_code");
                Some(ProcedureRecord {
                    icd_code: icd_code?,
                    description: row.get("long_title"),
                    seq_number: row.get("seq_num"),
                })
            })
            .collect())
    }

    async fn load_transfers(
        &self,
        client: &deadpool_postgres::Object,
        hadm_id: i32,
    ) -> Result<Vec<TransferRecord>> {
        let query = format!(
            "SELECT curr_wardid, intime, outtime \
             FROM {}.transfers WHERE hadm_id = $1 AND curr_wardid IS NOT NULL \
             ORDER BY intime",
            self.schema
        );
        let rows = client.query(&query, &[&hadm_id]).await?;
        Ok(rows
            .into_iter()
            .map(|row| TransferRecord {
                ward_id: row.get("curr_wardid"),
                in_time: to_utc(row.get("intime")),
                out_time: to_utc(row.get("outtime")),
            })
            .collect())
    }

    async fn load_prescriptions(
        &self,
        client: &deadpool_postgres::Object,
        hadm_id: i32,
    ) -> Result<Vec<PrescriptionRecord>> {
        let query = format!(
            "SELECT drug, ndc, gsn, dose_val_rx, dose_unit_rx, route, startdate, enddate \
             FROM {}.prescriptions WHERE hadm_id = $1 ORDER BY startdate",
            self.schema
        );
        let rows = client.query(&query, &[&hadm_id]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let drug: Option<String> = row.get("drug");
                Some(PrescriptionRecord {
                    drug_name: drug?,
                    ndc: row.get("ndc"),
                    gsn: row.get("gsn"),
                    dose_value: row.get("dose_val_rx"),
                    dose_unit: row.get("dose_unit_rx"),
                    route: row.get("route"),
                    start: to_utc(row.get("startdate")),
                    end: to_utc(row.get("enddate")),
                })
            })
            .collect())
    }

    async fn load_chart_events(
        &self,
        client: &deadpool_postgres::Object,
        hadm_id: i32,
    ) -> Result<Vec<ChartEventRecord>> {
        let query = format!(
            "SELECT c.charttime, c.cgid, c.value, c.valuenum, c.valueuom, i.label \
             FROM {0}.chartevents c \
             JOIN {0}.d_items i ON c.itemid = i.itemid \
             WHERE c.hadm_id = $1 AND (c.error IS NULL OR c.error <> 1) \
             ORDER BY c.charttime",
            self.schema
        );
        let rows = client.query(&query, &[&hadm_id]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let label: Option<String> = row.get("label");
                Some(ChartEventRecord {
                    measurement: label?,
                    value: row.get("value"),
                    numeric_value: row.get("valuenum"),
                    unit: row.get("valueuom"),
                    caregiver_id: row.get("cgid"),
                    record_time: to_utc(row.get("charttime")),
                })
            })
            .collect())
    }

    async fn load_lab_events(
        &self,
        client: &deadpool_postgres::Object,
        hadm_id: i32,
    ) -> Result<Vec<LabEventRecord>> {
        let query = format!(
            "SELECT l.charttime, l.value, l.valuenum, l.valueuom, l.flag, \
                    i.label, i.fluid, i.loinc_code \
             FROM {0}.labevents l \
             JOIN {0}.d_labitems i ON l.itemid = i.itemid \
             WHERE l.hadm_id = $1 ORDER BY l.charttime",
            self.schema
        );
        let rows = client.query(&query, &[&hadm_id]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let label: Option<String> = row.get("label");
                let flag: Option<String> = row.get("flag");
                Some(LabEventRecord {
                    measurement: label?,
                    loinc_code: row.get("loinc_code"),
                    fluid: row.get("fluid"),
                    value: row.get("value"),
                    numeric_value: row.get("valuenum"),
                    unit: row.get("valueuom"),
                    abnormal: flag.as_deref() == Some("abnormal"),
                    record_time: to_utc(row.get("charttime")),
                })
            })
            .collect())
    }
}

#[async_trait]
impl RecordSource for PostgresSource {
    async fn patient_count(&self) -> Result<u32> {
        let client = self.client().await?;
        let query = format!("SELECT COUNT(*) FROM {}.patients", self.schema);
        let row = client.query_one(&query, &[]).await?;
        let count: i64 = row.get(0);
        Ok(count as u32)
    }

    async fn patient_by_index(&self, index: u32) -> Result<PatientRecord> {
        if index == 0 {
            return Err(MeridianError::BuilderData(
                "patient index is 1-based".to_string(),
            ));
        }
        let client = self.client().await?;
        let query = format!(
            "SELECT subject_id, gender, dob, dod \
             FROM {}.patients ORDER BY row_id LIMIT 1 OFFSET $1",
            self.schema
        );
        let offset = i64::from(index - 1);
        let row = client
            .query_opt(&query, &[&offset])
            .await?
            .ok_or_else(|| MeridianError::BuilderData(format!("no patient at index {index}")))?;

        let subject_id: i32 = row.get("subject_id");
        Ok(PatientRecord {
            subject_id: subject_id.to_string(),
            gender: row.get("gender"),
            birth_date: to_utc(row.get("dob")),
            death_date: to_utc(row.get("dod")),
            admissions: self.load_admissions(&client, subject_id).await?,
        })
    }

    async fn wards(&self) -> Result<HashMap<i32, WardRecord>> {
        let client = self.client().await?;
        let query = format!(
            "SELECT DISTINCT curr_wardid, curr_careunit \
             FROM {}.transfers WHERE curr_wardid IS NOT NULL",
            self.schema
        );
        let rows = client.query(&query, &[]).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let ward_id: i32 = row.get("curr_wardid");
                (
                    ward_id,
                    WardRecord {
                        ward_id,
                        care_unit: row.get("curr_careunit"),
                    },
                )
            })
            .collect())
    }

    async fn caregivers(&self) -> Result<HashMap<i32, CaregiverRecord>> {
        let client = self.client().await?;
        let query = format!("SELECT cgid, label, description FROM {}.caregivers", self.schema);
        let rows = client.query(&query, &[]).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let caregiver_id: i32 = row.get("cgid");
                (
                    caregiver_id,
                    CaregiverRecord {
                        caregiver_id,
                        title: row.get("label"),
                        description: row.get("description"),
                    },
                )
            })
            .collect())
    }
}

fn to_utc(naive: Option<NaiveDateTime>) -> Option<DateTime<Utc>> {
    naive.map(|n| Utc.from_utc_datetime(&n))
}
