use std::path::{Path, PathBuf};

use csv::Reader;
use serde::Deserialize;

use crate::error::{ExperimentError, Result};

/// One benchmark patch as described by the dataset CSV.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SubjectRow {
    pub id: String,
    pub project: String,
    pub bug: String,
    pub base_dir: String,
    pub main_dep: String,
    pub tests_build: String,
    pub target_test: String,
    pub target_test_methods: String,
    pub tests_src_dir: String,
    pub target_class: String,
    pub input_class: String,
    pub correctness: String,
}

impl SubjectRow {
    pub fn is_correct(&self) -> bool {
        self.correctness == "Correct"
    }
}

#[derive(Debug)]
pub struct Dataset {
    path: PathBuf,
    rows: Vec<SubjectRow>,
}

impl Dataset {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Dataset> {
        let path = path.as_ref();
        let mut rdr = Reader::from_path(path)?;
        let rows = rdr
            .deserialize()
            .collect::<std::result::Result<Vec<SubjectRow>, csv::Error>>()?;

        Ok(Dataset {
            path: path.to_path_buf(),
            rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row with the given id.
    pub fn find(&self, id: &str) -> Option<&SubjectRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn subject(&self, id: &str) -> Result<&SubjectRow> {
        self.find(id).ok_or_else(|| ExperimentError::SubjectNotFound {
            id: id.to_string(),
            dataset: self.path.clone(),
        })
    }
}

#[test]
fn load_and_find_subjects() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("subjects.csv");
    std::fs::write(
        &path,
        "id,project,bug,base_dir,main_dep,tests_build,target_test,target_test_methods,tests_src_dir,target_class,input_class,correctness,tool\n\
         Patch1,Chart,1,Patch1/Chart1b,build:lib/a.jar,build-tests,org.jfree.TestA,testFoo,tests,org.jfree.A,org.jfree.B,Incorrect,jGenProg\n\
         Patch2,Lang,10,Patch2/Lang10b,target/classes,target/tests,org.apache.TestC,testBar,src/test,org.apache.C,org.apache.D,Correct,Nopol\n\
         Patch1,Math,3,dup,x,y,z,w,v,u,t,Correct,dup\n",
    )
    .unwrap();

    let dataset = Dataset::load(&path).unwrap();
    assert_eq!(dataset.len(), 3);

    let first = dataset.find("Patch1").unwrap();
    assert_eq!(first.project, "Chart");
    assert_eq!(first.bug, "1");
    assert_eq!(first.main_dep, "build:lib/a.jar");
    assert!(!first.is_correct());

    assert!(dataset.find("Patch2").unwrap().is_correct());
    assert!(dataset.find("Patch3").is_none());

    match dataset.subject("Patch3") {
        Err(ExperimentError::SubjectNotFound { id, .. }) => assert_eq!(id, "Patch3"),
        other => panic!("expected SubjectNotFound, got {:?}", other),
    }
}
