use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// A schema package written to a temporary directory, optionally zipped
pub struct SchemaPackage {
    files: Vec<(String, String)>,
}

impl SchemaPackage {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// The package used throughout the integration tests:
    /// an index including two object schemas, one shared type file,
    /// one file nobody references and one dangling import.
    pub fn sample() -> Self {
        Self::new()
            .file("xsd/index_data.xsd", INDEX_XSD)
            .file("xsd/objekty/budova.xsd", BUDOVA_XSD)
            .file("xsd/objekty/silnice.xsd", SILNICE_XSD)
            .file("xsd/spolecne/typy.xsd", TYPY_XSD)
            .file("xsd/spolecne/stare.xsd", TYPY_XSD)
    }

    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    /// Write every file under a fresh directory
    pub fn write_dir(&self) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for (name, content) in &self.files {
            let path = temp_dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        temp_dir
    }

    /// Write the package as a zip archive; entries can be nested under `wrapper`.
    pub fn write_zip(&self, dir: &Path, wrapper: Option<&str>) -> PathBuf {
        let archive_path = dir.join("balik.zip");
        let file = fs::File::create(&archive_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);

        for (name, content) in &self.files {
            let entry = match wrapper {
                Some(wrapper) => format!("{wrapper}/{name}"),
                None => name.clone(),
            };
            writer
                .start_file(entry, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();

        archive_path
    }
}

pub fn write_rules(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("rules.json");
    fs::write(&path, content).unwrap();
    path
}

pub const RULES_JSON: &str = r#"{
    "output_fields": ["filename", "namespace", "name", "type", "poznamka"],
    "element_types": {
        "OblastObjektuKI": { "exist": true, "minOccurs": true },
        "atr:Kod": { "minOccurs": "unique" },
        "GeometrieObjektu": { "geometry": true },
        "Zaznam": { "attributes": { "id": ["use", "type"] } }
    }
}"#;

pub const INDEX_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:cz:index">
    <xs:include schemaLocation="objekty/budova.xsd"/>
    <xs:include schemaLocation="objekty/silnice.xsd"/>
    <xs:import namespace="urn:cz:chybi" schemaLocation="../xsd/chybi/chybi.xsd"/>
</xs:schema>"#;

pub const TYPY_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:cz:typy">
    <xs:simpleType name="KodType"><xs:restriction base="xs:string"/></xs:simpleType>
</xs:schema>"#;

pub const BUDOVA_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:obj="urn:cz:objekty:budova"
           targetNamespace="urn:cz:objekty:budova">
    <xs:include schemaLocation="../spolecne/typy.xsd"/>
    <xs:element name="Budova" type="obj:BudovaType"/>
    <xs:complexType name="BudovaType">
        <xs:sequence>
            <xs:element name="OblastObjektuKI" minOccurs="0"/>
            <xs:element ref="atr:OblastObjektuKI" minOccurs="0"/>
            <xs:element ref="atr:Kod" minOccurs="1"/>
            <xs:element ref="atr:Kod" minOccurs="1"/>
            <xs:element name="GeometrieObjektu" minOccurs="0">
                <xs:complexType>
                    <xs:choice>
                        <xs:element ref="gml:Point"/>
                        <xs:element ref="gml:Line"/>
                    </xs:choice>
                </xs:complexType>
            </xs:element>
        </xs:sequence>
    </xs:complexType>
</xs:schema>"#;

pub const SILNICE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:obj="urn:cz:objekty:silnice"
           targetNamespace="urn:cz:objekty:silnice">
    <xs:element name="Silnice" type="obj:SilniceType"/>
    <xs:complexType name="SilniceType">
        <xs:sequence>
            <xs:element ref="atr:Kod" minOccurs="0"/>
            <xs:element name="Zaznam">
                <xs:complexType>
                    <xs:attribute name="id" use="required" type="xs:ID"/>
                </xs:complexType>
            </xs:element>
        </xs:sequence>
    </xs:complexType>
</xs:schema>"#;

pub const MALFORMED_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"><unclosed>"#;
