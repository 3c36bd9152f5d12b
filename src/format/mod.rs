use module::Module;
use ::*;

pub mod med;

// Supported formats

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Format {
    Mmd0,
    Mmd1,
    Mmd2,
    Mmd3,
}

pub struct FormatInfo {
    pub format: Format,
    pub title : String,
}

// Trait for module loader

pub trait Loader {
    fn name(&self) -> &'static str;
    fn probe(&self, &[u8]) -> Result<FormatInfo, Error>;
    fn load(self: Box<Self>, &[u8], FormatInfo) -> Result<Module, Error>;
}


pub fn list() -> Vec<Box<Loader>> {
    vec![
        Box::new(med::MedLoader),
    ]
}

pub fn load(b: &[u8]) -> Result<Module, Error> {

    for f in list() {
        debug!("Probing format: {}", f.name());

        let info = match f.probe(b) {
            Ok(val) => val,
            Err(_)  => continue,
        };

        debug!("Probe ok, load format {:?}", info.format);
        return f.load(b, info)
    }

    Err(Error::Format("unsupported module format".to_owned()))
}
