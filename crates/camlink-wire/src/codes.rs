//! PTP code tables: operations, responses, events and object formats.
//!
//! Only the codes this camera family is known to use are named. Anything else
//! decodes to the `Other(u16)` variant and round-trips unchanged.

use std::fmt;

macro_rules! code_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A code outside the known table.
            Other(u16),
        }

        impl $name {
            pub fn from_u16(value: u16) -> Self {
                match value {
                    $( $value => Self::$variant, )+
                    other => Self::Other(other),
                }
            }

            pub fn to_u16(self) -> u16 {
                match self {
                    $( Self::$variant => $value, )+
                    Self::Other(value) => value,
                }
            }

            /// Variant name, or "Unknown" for codes outside the table.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )+
                    Self::Other(_) => "Unknown",
                }
            }
        }

        impl From<u16> for $name {
            fn from(value: u16) -> Self {
                Self::from_u16(value)
            }
        }

        impl From<$name> for u16 {
            fn from(code: $name) -> u16 {
                code.to_u16()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} (0x{:04X})", self.name(), self.to_u16())
            }
        }
    };
}

code_table! {
    /// PTP operation codes (CIPA DC-005 plus two Samsung vendor extensions).
    OperationCode {
        GetDeviceInfo = 0x1001,
        OpenSession = 0x1002,
        CloseSession = 0x1003,
        GetStorageIds = 0x1004,
        GetStorageInfo = 0x1005,
        GetNumObjects = 0x1006,
        GetObjectHandles = 0x1007,
        GetObjectInfo = 0x1008,
        GetObject = 0x1009,
        GetThumb = 0x100A,
        DeleteObject = 0x100B,
        SendObjectInfo = 0x100C,
        SendObject = 0x100D,
        InitiateCapture = 0x100E,
        FormatStore = 0x100F,
        ResetDevice = 0x1010,
        SelfTest = 0x1011,
        SetObjectProtection = 0x1012,
        PowerDown = 0x1013,
        GetDevicePropDesc = 0x1014,
        GetDevicePropValue = 0x1015,
        SetDevicePropValue = 0x1016,
        ResetDevicePropValue = 0x1017,
        TerminateOpenCapture = 0x1018,
        MoveObject = 0x1019,
        CopyObject = 0x101A,
        GetPartialObject = 0x101B,
        InitiateOpenCapture = 0x101C,
        /// Samsung vendor opcode observed during Wi-Fi sessions; semantics undocumented.
        SamsungVendor1 = 0x9001,
        /// Samsung vendor opcode observed during Wi-Fi sessions; semantics undocumented.
        SamsungVendor2 = 0x9002,
    }
}

code_table! {
    /// PTP response codes.
    ResponseCode {
        Ok = 0x2001,
        GeneralError = 0x2002,
        SessionNotOpen = 0x2003,
        InvalidTransactionId = 0x2004,
        OperationNotSupported = 0x2005,
        ParameterNotSupported = 0x2006,
        IncompleteTransfer = 0x2007,
        InvalidStorageId = 0x2008,
        InvalidObjectHandle = 0x2009,
        DevicePropNotSupported = 0x200A,
        InvalidObjectFormatCode = 0x200B,
        StoreFull = 0x200C,
        ObjectWriteProtected = 0x200D,
        StoreReadOnly = 0x200E,
        AccessDenied = 0x200F,
        NoThumbnailPresent = 0x2010,
        SelfTestFailed = 0x2011,
        PartialDeletion = 0x2012,
        StoreNotAvailable = 0x2013,
        SpecificationByFormatUnsupported = 0x2014,
        NoValidObjectInfo = 0x2015,
        InvalidCodeFormat = 0x2016,
        UnknownVendorCode = 0x2017,
        CaptureAlreadyTerminated = 0x2018,
        DeviceBusy = 0x2019,
        InvalidParentObject = 0x201A,
        InvalidDevicePropFormat = 0x201B,
        InvalidDevicePropValue = 0x201C,
        InvalidParameter = 0x201D,
        SessionAlreadyOpen = 0x201E,
        TransactionCancelled = 0x201F,
        SpecificationOfDestinationUnsupported = 0x2020,
    }
}

code_table! {
    /// PTP event codes delivered on the event connection.
    EventCode {
        CancelTransaction = 0x4001,
        ObjectAdded = 0x4002,
        ObjectRemoved = 0x4003,
        StoreAdded = 0x4004,
        StoreRemoved = 0x4005,
        DevicePropChanged = 0x4006,
        ObjectInfoChanged = 0x4007,
        DeviceInfoChanged = 0x4008,
        RequestObjectTransfer = 0x4009,
        StoreFull = 0x400A,
        DeviceReset = 0x400B,
        StorageInfoChanged = 0x400C,
        CaptureComplete = 0x400D,
        UnreportedStatus = 0x400E,
    }
}

code_table! {
    /// PTP object format codes.
    ObjectFormatCode {
        Undefined = 0x3000,
        Association = 0x3001,
        Script = 0x3002,
        Text = 0x3004,
        Html = 0x3005,
        Wav = 0x3008,
        Mp3 = 0x3009,
        Avi = 0x300A,
        Mpeg = 0x300B,
        QuickTime = 0x300D,
        UndefinedImage = 0x3800,
        ExifJpeg = 0x3801,
        Bmp = 0x3804,
        Gif = 0x3807,
        Jfif = 0x3808,
        Png = 0x380B,
        Tiff = 0x380D,
        /// MTP extension, used by newer firmware for MP4 clips.
        Mp4Container = 0xB982,
    }
}

impl ResponseCode {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}
