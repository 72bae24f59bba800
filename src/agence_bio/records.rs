//! Operator records and their four tabular projections.

use crate::error::Result;
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const PRINCIPAL_FILE: &str = "agence_bio_principal.csv";
pub const CERTIFICATIONS_FILE: &str = "agence_bio_certifications.csv";
pub const PRODUCTIONS_FILE: &str = "agence_bio_productions.csv";
pub const ADDRESSES_FILE: &str = "agence_bio_adresses.csv";

/// Extract file names, principal first.
pub const EXTRACT_FILES: [&str; 4] = [PRINCIPAL_FILE, CERTIFICATIONS_FILE, PRODUCTIONS_FILE, ADDRESSES_FILE];

fn nullable_vec<'de, D>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One operator as returned by the Agence Bio API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operator {
    #[serde(rename = "numeroBio", default)]
    pub numero_bio: Value,
    #[serde(default)]
    pub siret: Value,
    #[serde(rename = "raisonSociale", default)]
    pub raison_sociale: Value,
    #[serde(default)]
    pub denominationcourante: Value,
    #[serde(default)]
    pub telephone: Value,
    #[serde(default)]
    pub email: Value,
    #[serde(rename = "codeNAF", default)]
    pub code_naf: Value,
    #[serde(default)]
    pub gerant: Value,
    #[serde(rename = "dateMaj", default)]
    pub date_maj: Value,
    #[serde(rename = "telephoneCommerciale", default)]
    pub telephone_commerciale: Value,
    #[serde(default)]
    pub reseau: Value,
    #[serde(default)]
    pub categories: Value,
    #[serde(rename = "siteWebs", default)]
    pub site_webs: Value,
    #[serde(default)]
    pub mixite: Value,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub activites: Vec<Value>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub certificats: Vec<Value>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub productions: Vec<Value>,
    #[serde(rename = "adressesOperateurs", default, deserialize_with = "nullable_vec")]
    pub adresses_operateurs: Vec<Value>,
}

/// CSV cell text: empty for null, raw for strings, compact JSON otherwise.
pub fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn field(obj: &Value, key: &str) -> String {
    obj.get(key).map(cell).unwrap_or_default()
}

/// Comma-joined `prop` of every element.
pub fn flatten_prop(items: &[Value], prop: &str) -> String {
    items.iter().map(|item| field(item, prop)).join(",")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorRow {
    pub id_bio: String,
    pub siret: String,
    pub nom_raison_sociale: String,
    pub denomination_courante: String,
    pub telephone: String,
    pub email: String,
    pub code_naf: String,
    pub gerant: String,
    pub date_maj: String,
    pub telephone_commerciale: String,
    pub reseau: String,
    pub categories: String,
    pub site_webs: String,
    pub mixite: String,
    pub activites: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificationRow {
    pub id_bio: String,
    pub siret: String,
    pub organisme: String,
    pub etat_certification: String,
    pub date_suspension: String,
    pub date_arret: String,
    pub date_engagement: String,
    pub date_notification: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionRow {
    pub id_bio: String,
    pub siret: String,
    pub code: String,
    pub nom: String,
    pub etat_productions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressRow {
    pub id_bio: String,
    pub siret: String,
    pub adresse: String,
    pub code_postal: String,
    pub commune: String,
    pub lat: String,
    pub long: String,
    pub code_commune: String,
    pub active: String,
    pub code_departement: String,
    pub type_adresse_operateurs: String,
}

impl OperatorRow {
    pub fn from_operator(op: &Operator) -> Self {
        Self {
            id_bio: cell(&op.numero_bio),
            siret: cell(&op.siret),
            nom_raison_sociale: cell(&op.raison_sociale),
            denomination_courante: cell(&op.denominationcourante),
            telephone: cell(&op.telephone),
            email: cell(&op.email),
            code_naf: cell(&op.code_naf),
            gerant: cell(&op.gerant),
            date_maj: cell(&op.date_maj),
            telephone_commerciale: cell(&op.telephone_commerciale),
            reseau: cell(&op.reseau),
            categories: cell(&op.categories),
            site_webs: cell(&op.site_webs),
            mixite: cell(&op.mixite),
            activites: flatten_prop(&op.activites, "nom"),
        }
    }
}

impl CertificationRow {
    fn from_certificate(parent: &OperatorRow, cert: &Value) -> Self {
        Self {
            id_bio: parent.id_bio.clone(),
            siret: parent.siret.clone(),
            organisme: field(cert, "organisme"),
            etat_certification: field(cert, "etatCertification"),
            date_suspension: field(cert, "dateSuspension"),
            date_arret: field(cert, "dateArret"),
            date_engagement: field(cert, "dateEngagement"),
            date_notification: field(cert, "dateNotification"),
            url: field(cert, "url"),
        }
    }
}

impl ProductionRow {
    fn from_production(parent: &OperatorRow, prod: &Value) -> Self {
        let states = prod
            .get("etatProductions")
            .and_then(Value::as_array)
            .map(|states| flatten_prop(states, "etatProduction"))
            .unwrap_or_default();
        Self {
            id_bio: parent.id_bio.clone(),
            siret: parent.siret.clone(),
            code: field(prod, "code"),
            nom: field(prod, "nom"),
            etat_productions: states,
        }
    }
}

impl AddressRow {
    fn from_address(parent: &OperatorRow, adr: &Value) -> Self {
        Self {
            id_bio: parent.id_bio.clone(),
            siret: parent.siret.clone(),
            adresse: field(adr, "lieu"),
            code_postal: field(adr, "codePostal"),
            commune: field(adr, "ville"),
            lat: field(adr, "lat"),
            long: field(adr, "long"),
            code_commune: field(adr, "codeCommune"),
            active: field(adr, "active"),
            code_departement: field(adr, "departementId"),
            type_adresse_operateurs: field(adr, "typeAdresseOperateurs"),
        }
    }
}

/// The four extracts, rows in harvest order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracts {
    pub operators: Vec<OperatorRow>,
    pub certifications: Vec<CertificationRow>,
    pub productions: Vec<ProductionRow>,
    pub addresses: Vec<AddressRow>,
}

impl Extracts {
    pub fn from_operators(operators: &[Operator]) -> Self {
        let mut extracts = Extracts::default();
        for op in operators {
            let row = OperatorRow::from_operator(op);
            extracts
                .certifications
                .extend(op.certificats.iter().map(|c| CertificationRow::from_certificate(&row, c)));
            extracts
                .productions
                .extend(op.productions.iter().map(|p| ProductionRow::from_production(&row, p)));
            extracts
                .addresses
                .extend(op.adresses_operateurs.iter().map(|a| AddressRow::from_address(&row, a)));
            extracts.operators.push(row);
        }
        extracts
    }

    pub fn distinct_id_bio(&self) -> usize {
        self.operators
            .iter()
            .map(|r| r.id_bio.as_str())
            .filter(|v| !v.is_empty())
            .unique()
            .count()
    }

    pub fn distinct_siret(&self) -> usize {
        self.operators
            .iter()
            .map(|r| r.siret.as_str())
            .filter(|v| !v.is_empty())
            .unique()
            .count()
    }

    /// Write the four CSV files into `dir`, returning their paths in
    /// [`EXTRACT_FILES`] order.
    pub fn write_csv(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let paths = vec![
            write_rows(&dir.join(PRINCIPAL_FILE), &self.operators)?,
            write_rows(&dir.join(CERTIFICATIONS_FILE), &self.certifications)?,
            write_rows(&dir.join(PRODUCTIONS_FILE), &self.productions)?,
            write_rows(&dir.join(ADDRESSES_FILE), &self.addresses)?,
        ];
        Ok(paths)
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<PathBuf> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_operator() -> Operator {
        serde_json::from_value(json!({
            "numeroBio": 41520,
            "siret": "12345678900011",
            "raisonSociale": "GAEC DES PRES",
            "denominationcourante": null,
            "codeNAF": "01.50Z",
            "dateMaj": "2024-02-01",
            "siteWebs": [{"url": "https://gaec.example"}],
            "mixite": false,
            "activites": [{"id": 1, "nom": "Production"}, {"id": 2, "nom": "Distribution"}],
            "certificats": [
                {
                    "organisme": "Ecocert",
                    "etatCertification": "ENGAGEE",
                    "dateEngagement": "2019-04-01",
                    "url": "https://cert/1"
                },
                {"organisme": "Bureau Veritas", "etatCertification": "ARRETEE", "dateArret": "2018-12-31"}
            ],
            "productions": [
                {
                    "code": "01.11",
                    "nom": "Blé tendre",
                    "etatProductions": [{"etatProduction": "AB"}, {"etatProduction": "C1"}]
                }
            ],
            "adressesOperateurs": [
                {"lieu": "1 chemin des prés", "codePostal": "01000", "ville": "Bourg", "lat": 46.2, "long": 5.2,
                 "codeCommune": "01053", "active": true, "departementId": 1, "typeAdresseOperateurs": ["siege"]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_projection_carries_parent_keys() {
        let extracts = Extracts::from_operators(&[sample_operator()]);

        assert_eq!(extracts.operators.len(), 1);
        assert_eq!(extracts.certifications.len(), 2);
        assert_eq!(extracts.productions.len(), 1);
        assert_eq!(extracts.addresses.len(), 1);

        let op = &extracts.operators[0];
        assert_eq!(op.id_bio, "41520");
        assert_eq!(op.denomination_courante, "");
        assert_eq!(op.activites, "Production,Distribution");
        assert_eq!(op.site_webs, r#"[{"url":"https://gaec.example"}]"#);
        assert_eq!(op.mixite, "false");

        for cert in &extracts.certifications {
            assert_eq!((cert.id_bio.as_str(), cert.siret.as_str()), ("41520", "12345678900011"));
        }
        assert_eq!(extracts.certifications[1].date_arret, "2018-12-31");
        assert_eq!(extracts.certifications[1].url, "");
        assert_eq!(extracts.productions[0].etat_productions, "AB,C1");

        let adr = &extracts.addresses[0];
        assert_eq!(adr.adresse, "1 chemin des prés");
        assert_eq!(adr.code_departement, "1");
        assert_eq!(adr.active, "true");
        assert_eq!(adr.type_adresse_operateurs, r#"["siege"]"#);
    }

    #[test]
    fn test_null_collections_are_empty() {
        let op: Operator = serde_json::from_value(json!({
            "numeroBio": 7, "siret": null, "activites": null, "certificats": null
        }))
        .unwrap();
        let extracts = Extracts::from_operators(&[op]);
        assert_eq!(extracts.operators[0].activites, "");
        assert!(extracts.certifications.is_empty());
        assert_eq!(extracts.distinct_siret(), 0);
        assert_eq!(extracts.distinct_id_bio(), 1);
    }

    #[test]
    fn test_write_csv_headers() {
        let dir = std::env::temp_dir().join(format!("dgv-extracts-{}", uuid::Uuid::new_v4()));
        let extracts = Extracts::from_operators(&[sample_operator()]);
        let paths = extracts.write_csv(&dir).unwrap();
        assert_eq!(paths.len(), 4);

        let principal = fs::read_to_string(&paths[0]).unwrap();
        let header = principal.lines().next().unwrap();
        assert_eq!(
            header,
            "id_bio,siret,nom_raison_sociale,denomination_courante,telephone,email,code_naf,gerant,\
             date_maj,telephone_commerciale,reseau,categories,site_webs,mixite,activites"
        );
        let productions = fs::read_to_string(&paths[2]).unwrap();
        assert!(productions.starts_with("id_bio,siret,code,nom,etat_productions\n"));
        assert!(productions.contains("41520,12345678900011,01.11,Blé tendre,\"AB,C1\""));
    }
}
